// The unreliable datagram channel is an external collaborator. A lossy
// test double implementing the same trait lives under tests/support.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub trait DatagramChannel: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
    fn stop_recv(&self) -> io::Result<()>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

// There is no portable way to wake a blocked recv_from on another thread,
// so recv_from polls with a short read timeout and re-checks stopped
// between attempts.
pub struct UdpChannel {
    socket: UdpSocket,
    stopped: AtomicBool,
}

const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(100);

impl UdpChannel {
    pub fn bind(src_addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(src_addr)?;
        socket.set_read_timeout(Some(RECV_POLL_TIMEOUT))?;
        Ok(UdpChannel {
            socket,
            stopped: AtomicBool::new(false),
        })
    }
}

impl DatagramChannel for UdpChannel {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "channel stopped",
                ));
            }

            match self.socket.recv_from(buf) {
                Ok(result) => return Ok(result),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    continue
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn stop_recv(&self) -> io::Result<()> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
