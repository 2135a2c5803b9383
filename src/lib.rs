use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

mod channel;
mod config;
mod err;
mod frame;
mod receiver;
mod sender;
mod teardown;

pub use channel::{DatagramChannel, UdpChannel};
pub use config::Config;
pub use err::Error;
pub use frame::{build as build_frame, parse as parse_frame, CorruptPacket, Frame, Kind};

use receiver::Receiver;
use sender::Sender;
use teardown::Teardown;

// Reliable, ordered, byte-stream connection over an unreliable datagram
// channel. A sender retransmit loop and a receiver dispatch loop run in
// the background for the lifetime of the connection.
pub struct Transport {
    channel: Arc<dyn DatagramChannel>,
    dst_addr: SocketAddr,
    config: Config,
    sender: Arc<Sender>,
    receiver: Arc<Receiver>,
    teardown: Arc<Teardown>,
    threads: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl Transport {
    // src_addr of None binds any local interface on a free port.
    pub fn new(dst_addr: SocketAddr, src_addr: Option<SocketAddr>) -> Result<Transport, Error> {
        Self::with_config(dst_addr, src_addr, Config::default())
    }

    pub fn with_config(
        dst_addr: SocketAddr,
        src_addr: Option<SocketAddr>,
        config: Config,
    ) -> Result<Transport, Error> {
        let bind_addr = src_addr.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
        let channel: Arc<dyn DatagramChannel> = Arc::new(UdpChannel::bind(bind_addr)?);
        Ok(Self::with_channel(channel, dst_addr, config))
    }

    // Used internally by new/with_config, and by tests that inject a
    // lossy channel double.
    pub fn with_channel(
        channel: Arc<dyn DatagramChannel>,
        dst_addr: SocketAddr,
        config: Config,
    ) -> Transport {
        let sender = Arc::new(Sender::new());
        let receiver = Arc::new(Receiver::new());
        let teardown = Arc::new(Teardown::new());

        let receiver_thread = {
            let channel = channel.clone();
            let sender = sender.clone();
            let receiver = receiver.clone();
            let teardown = teardown.clone();
            let buf_len = config.chunk + frame::HEADER_LEN;
            thread::spawn(move || {
                receiver_loop(channel, dst_addr, sender, receiver, teardown, buf_len)
            })
        };

        let sender_thread = {
            let channel = channel.clone();
            let sender = sender.clone();
            let teardown = teardown.clone();
            thread::spawn(move || sender_loop(channel, dst_addr, sender, teardown, config))
        };

        Transport {
            channel,
            dst_addr,
            config,
            sender,
            receiver,
            teardown,
            threads: Mutex::new(Some((sender_thread, receiver_thread))),
        }
    }

    pub fn submit(&self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.sender.submit(bytes, self.config.chunk)
    }

    pub fn read(&self) -> Vec<u8> {
        self.receiver.read(self.config.poll_interval)
    }

    pub fn close(&self) -> Result<(), Error> {
        while !self.sender.is_fully_acked() {
            thread::sleep(self.config.poll_interval);
        }

        let fin = frame::build(0, Kind::Fin, &[]);
        self.channel.send_to(&fin, self.dst_addr)?;
        let mut last_sent = Instant::now();
        let mut retries: u32 = 0;

        while !self.teardown.is_fin_acked() {
            if last_sent.elapsed() >= self.config.ack_timeout {
                self.channel.send_to(&fin, self.dst_addr)?;
                last_sent = Instant::now();
                retries += 1;

                if let Some(max_retries) = self.config.max_fin_retries {
                    if retries > max_retries {
                        return Err(Error::PeerUnreachable);
                    }
                }
            }
            thread::sleep(self.config.poll_interval);
        }

        // Dwell in case the peer retransmits its own FIN because our
        // FIN-ACK to it was lost; we must still be listening to answer it.
        thread::sleep(self.config.grace);

        self.teardown.set_closed();
        self.channel.stop_recv()?;
        self.join_background_threads();

        Ok(())
    }

    fn join_background_threads(&self) {
        if let Some((sender_thread, receiver_thread)) = self.threads.lock().unwrap().take() {
            let _ = sender_thread.join();
            let _ = receiver_thread.join();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if !self.teardown.is_closed() {
            log::warn!("Transport dropped without close(); tearing down without the FIN handshake");
            self.teardown.set_closed();
            let _ = self.channel.stop_recv();
            self.join_background_threads();
        }
    }
}

fn sender_loop(
    channel: Arc<dyn DatagramChannel>,
    dst_addr: SocketAddr,
    sender: Arc<Sender>,
    teardown: Arc<Teardown>,
    config: Config,
) {
    while !teardown.is_closed() {
        if let Err(e) = sender.retransmit_tick(channel.as_ref(), dst_addr, config.window) {
            log::warn!("retransmit tick failed: {e}");
        }
        thread::sleep(config.ack_timeout);
    }
}

fn receiver_loop(
    channel: Arc<dyn DatagramChannel>,
    dst_addr: SocketAddr,
    sender: Arc<Sender>,
    receiver: Arc<Receiver>,
    teardown: Arc<Teardown>,
    buf_len: usize,
) {
    let mut buf = vec![0u8; buf_len];
    while !teardown.is_closed() {
        match channel.recv_from(&mut buf) {
            Ok((n, _src)) => {
                handle_datagram(&buf[..n], &sender, &receiver, &teardown, channel.as_ref(), dst_addr);
            }
            Err(e) => {
                if teardown.is_closed() {
                    break;
                }
                // ListenerDied policy: log and continue, never let one bad
                // datagram or transient I/O error kill the dispatch loop.
                log::warn!("listener error: {e}; continuing");
            }
        }
    }
}

fn handle_datagram(
    datagram: &[u8],
    sender: &Sender,
    receiver: &Receiver,
    teardown: &Teardown,
    channel: &dyn DatagramChannel,
    dst_addr: SocketAddr,
) {
    let parsed = match frame::parse(datagram) {
        Ok(parsed) => parsed,
        Err(_) => {
            log::debug!("dropping corrupt datagram ({} bytes)", datagram.len());
            return;
        }
    };

    match parsed.kind {
        Kind::FinAck => {
            teardown.set_fin_acked();
        }
        Kind::Ack => {
            sender.on_ack(frame::wire_to_ack_seq(parsed.seq));
        }
        Kind::Fin => {
            let ack_wire = frame::ack_seq_to_wire(receiver.last_inorder_seq());
            let reply = frame::build(ack_wire, Kind::FinAck, &[]);
            if let Err(e) = channel.send_to(&reply, dst_addr) {
                log::warn!("failed to send FIN-ACK: {e}");
            }
        }
        Kind::Data => {
            let last_inorder = receiver.admit(parsed.seq, parsed.payload);
            let ack_wire = frame::ack_seq_to_wire(last_inorder);
            let ack_datagram = frame::build(ack_wire, Kind::Ack, &[]);
            if let Err(e) = channel.send_to(&ack_datagram, dst_addr) {
                log::warn!("failed to send ACK: {e}");
            }
        }
    }
}
