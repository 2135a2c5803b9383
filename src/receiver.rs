use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

// Only ever admits the next strictly-contiguous sequence number; anything
// else (a duplicate, or a packet arriving ahead of the gap) is dropped and
// left for the sender's retransmit loop to fill in later.
pub(crate) struct Receiver {
    received: Mutex<BTreeMap<u32, Vec<u8>>>,
    last_inorder_seq: AtomicI64,
    next_return_seq: AtomicU32,
}

impl Receiver {
    pub fn new() -> Self {
        Receiver {
            received: Mutex::new(BTreeMap::new()),
            last_inorder_seq: AtomicI64::new(-1),
            next_return_seq: AtomicU32::new(0),
        }
    }

    // Returns last_inorder_seq either way, so a dropped duplicate or
    // out-of-order packet still triggers a (re)ack of the current cursor.
    pub fn admit(&self, seq: u32, payload: Vec<u8>) -> i64 {
        let mut received = self.received.lock().unwrap();
        let expected = self.last_inorder_seq.load(Ordering::Acquire) + 1;

        if i64::from(seq) == expected {
            received.insert(seq, payload);
            self.last_inorder_seq.store(expected, Ordering::Release);
        }

        self.last_inorder_seq.load(Ordering::Acquire)
    }

    pub fn last_inorder_seq(&self) -> i64 {
        self.last_inorder_seq.load(Ordering::Acquire)
    }

    pub fn read(&self, poll_interval: Duration) -> Vec<u8> {
        loop {
            {
                let mut received = self.received.lock().unwrap();
                let cursor = self.next_return_seq.load(Ordering::Acquire);

                if received.contains_key(&cursor) {
                    let mut out = Vec::new();
                    let mut next = cursor;
                    while let Some(payload) = received.remove(&next) {
                        out.extend_from_slice(&payload);
                        next = next.wrapping_add(1);
                    }
                    self.next_return_seq.store(next, Ordering::Release);
                    return out;
                }
            }
            thread::sleep(poll_interval);
        }
    }
}
