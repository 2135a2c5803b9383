use std::io::{self, Write};
use std::net::SocketAddr;

use rudp::Transport;

fn main() {
    env_logger::init();

    let local_addr: SocketAddr = "127.0.0.1:34344".parse().unwrap();
    let peer_addr: SocketAddr = "127.0.0.1:34343".parse().unwrap();

    let transport = Transport::new(peer_addr, Some(local_addr)).expect("bind transport");

    println!(">>> Sending to {peer_addr}...");
    transport
        .submit(b"hello from the reliable transport client\n")
        .expect("submit");

    let echoed = transport.read();
    io::stdout().write_all(&echoed).unwrap();
    io::stdout().flush().unwrap();

    transport.close().expect("close");
}
