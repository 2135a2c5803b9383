// Test double for an unreliable datagram channel: drops, duplicates,
// reorders, and corrupts datagrams. Wraps a real rudp::UdpChannel and
// mangles outgoing datagrams before they hit the wire.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rudp::{DatagramChannel, UdpChannel};

// duplicate_every/corrupt_every: every Nth transmitted datagram is hit; 0
// disables. reorder_window: datagrams are held and shuffled in batches of
// this size before release; 0 or 1 disables reordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct LossConfig {
    pub drop_probability: f64,
    pub duplicate_every: u64,
    pub corrupt_every: u64,
    pub reorder_window: usize,
}

impl LossConfig {
    pub fn none() -> Self {
        LossConfig::default()
    }

    pub fn uniform_drop(probability: f64) -> Self {
        LossConfig {
            drop_probability: probability,
            ..Default::default()
        }
    }

    pub fn reordering(window: usize) -> Self {
        LossConfig {
            reorder_window: window,
            ..Default::default()
        }
    }

    pub fn duplicating(every: u64) -> Self {
        LossConfig {
            duplicate_every: every,
            ..Default::default()
        }
    }

    pub fn corrupting(every: u64) -> Self {
        LossConfig {
            corrupt_every: every,
            ..Default::default()
        }
    }
}

struct Pen {
    held: Vec<(Vec<u8>, SocketAddr)>,
}

// Mangles its outgoing direction only; recv_from and stop_recv pass
// straight through to the underlying socket.
pub struct LossyChannel {
    inner: Arc<dyn DatagramChannel>,
    config: LossConfig,
    rng: Mutex<StdRng>,
    send_count: AtomicU64,
    pen: Mutex<Pen>,
    flusher_stop: Arc<AtomicBool>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl LossyChannel {
    pub fn new(bind_addr: SocketAddr, config: LossConfig, seed: u64) -> io::Result<Arc<LossyChannel>> {
        let inner: Arc<dyn DatagramChannel> = Arc::new(UdpChannel::bind(bind_addr)?);
        let channel = Arc::new(LossyChannel {
            inner,
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            send_count: AtomicU64::new(0),
            pen: Mutex::new(Pen { held: Vec::new() }),
            flusher_stop: Arc::new(AtomicBool::new(false)),
            flusher: Mutex::new(None),
        });

        if config.reorder_window > 1 {
            let flusher_channel = channel.clone();
            let stop = channel.flusher_stop.clone();
            let handle = thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(150));
                    flusher_channel.flush_pen();
                }
            });
            *channel.flusher.lock().unwrap() = Some(handle);
        }

        Ok(channel)
    }

    fn flush_pen(&self) {
        let mut held = {
            let mut pen = self.pen.lock().unwrap();
            if pen.held.is_empty() {
                return;
            }
            std::mem::take(&mut pen.held)
        };

        let mut rng = self.rng.lock().unwrap();
        // Fisher-Yates shuffle.
        for i in (1..held.len()).rev() {
            let j = rng.gen_range(0..=i);
            held.swap(i, j);
        }
        drop(rng);

        for (datagram, addr) in held.drain(..) {
            let _ = self.inner.send_to(&datagram, addr);
        }
    }

    fn maybe_corrupt(&self, datagram: &mut [u8], count: u64) {
        if self.config.corrupt_every != 0 && count % self.config.corrupt_every == 0 && !datagram.is_empty() {
            let mut rng = self.rng.lock().unwrap();
            let byte_idx = rng.gen_range(0..datagram.len());
            let bit = rng.gen_range(0..8u8);
            datagram[byte_idx] ^= 1 << bit;
        }
    }

    pub fn stop(&self) {
        self.flusher_stop.store(true, Ordering::Release);
        if let Some(handle) = self.flusher.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl DatagramChannel for LossyChannel {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        let count = self.send_count.fetch_add(1, Ordering::AcqRel);

        let dropped = {
            let mut rng = self.rng.lock().unwrap();
            self.config.drop_probability > 0.0 && rng.gen_bool(self.config.drop_probability)
        };
        if dropped {
            return Ok(buf.len());
        }

        let mut datagram = buf.to_vec();
        self.maybe_corrupt(&mut datagram, count);

        if self.config.reorder_window > 1 {
            let mut pen = self.pen.lock().unwrap();
            pen.held.push((datagram.clone(), addr));
            if pen.held.len() >= self.config.reorder_window {
                let mut held = std::mem::take(&mut pen.held);
                drop(pen);

                let mut rng = self.rng.lock().unwrap();
                for i in (1..held.len()).rev() {
                    let j = rng.gen_range(0..=i);
                    held.swap(i, j);
                }
                drop(rng);

                for (datagram, addr) in held.drain(..) {
                    self.inner.send_to(&datagram, addr)?;
                }
                return Ok(buf.len());
            }
            return Ok(buf.len());
        }

        self.inner.send_to(&datagram, addr)?;

        if self.config.duplicate_every != 0 && count % self.config.duplicate_every == 0 {
            let _ = self.inner.send_to(&datagram, addr);
        }

        Ok(buf.len())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf)
    }

    fn stop_recv(&self) -> io::Result<()> {
        self.stop();
        self.inner.stop_recv()
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

pub fn free_loopback_addr() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind ephemeral");
    socket.local_addr().expect("local addr")
}

// Tallies outgoing DATA packets, for asserting on the exact number a
// transfer puts on the wire.
pub struct CountingChannel {
    inner: Arc<dyn DatagramChannel>,
    pub data_sent: AtomicU64,
}

impl CountingChannel {
    pub fn wrap(inner: Arc<dyn DatagramChannel>) -> Arc<CountingChannel> {
        Arc::new(CountingChannel {
            inner,
            data_sent: AtomicU64::new(0),
        })
    }
}

impl DatagramChannel for CountingChannel {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if let Ok(frame) = rudp::parse_frame(buf) {
            if matches!(frame.kind, rudp::Kind::Data) {
                self.data_sent.fetch_add(1, Ordering::AcqRel);
            }
        }
        self.inner.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf)
    }

    fn stop_recv(&self) -> io::Result<()> {
        self.inner.stop_recv()
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
