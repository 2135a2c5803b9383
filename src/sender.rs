use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::channel::DatagramChannel;
use crate::err::Error;
use crate::frame::{self, Kind};

// send_queue never shrinks during the connection's lifetime: packets are
// retained so the retransmit loop can always replay the current window.
pub(crate) struct Sender {
    send_queue: Mutex<Vec<Vec<u8>>>,
    max_acked_seq: AtomicI64,
    next_send_seq: AtomicU32,
}

impl Sender {
    pub fn new() -> Self {
        Sender {
            send_queue: Mutex::new(Vec::new()),
            max_acked_seq: AtomicI64::new(-1),
            next_send_seq: AtomicU32::new(0),
        }
    }

    // Fails if assigning sequence numbers to this submission would wrap
    // u32 (a wrapped seq could alias an already-acknowledged packet).
    pub fn submit(&self, bytes: &[u8], chunk: usize) -> Result<(), Error> {
        let mut queue = self.send_queue.lock().unwrap();
        for piece in bytes.chunks(chunk.max(1)) {
            let seq = self.next_send_seq.load(Ordering::Acquire);
            if seq == u32::MAX {
                return Err(Error::BuildPacketFailure {
                    seq,
                    reason: "sequence number space exhausted",
                });
            }
            self.next_send_seq.store(seq + 1, Ordering::Release);
            queue.push(frame::build(seq, Kind::Data, piece));
        }
        Ok(())
    }

    pub fn retransmit_tick(
        &self,
        channel: &dyn DatagramChannel,
        dst_addr: SocketAddr,
        window: usize,
    ) -> io::Result<()> {
        let queue = self.send_queue.lock().unwrap();
        let send_base = (self.max_acked_seq.load(Ordering::Acquire) + 1) as usize;
        let end = (send_base + window).min(queue.len());

        for datagram in &queue[send_base..end] {
            channel.send_to(datagram, dst_addr)?;
        }
        Ok(())
    }

    // Monotonic: an older ACK changes nothing, so re-delivering one is a no-op.
    pub fn on_ack(&self, acked_seq: i64) {
        self.max_acked_seq.fetch_max(acked_seq, Ordering::AcqRel);
    }

    pub fn is_fully_acked(&self) -> bool {
        let queue = self.send_queue.lock().unwrap();
        (self.max_acked_seq.load(Ordering::Acquire) + 1) as usize >= queue.len()
    }
}
