use std::io::{self, Write};
use std::net::SocketAddr;

use rudp::Transport;

fn main() {
    env_logger::init();

    let local_addr: SocketAddr = "127.0.0.1:34343".parse().unwrap();
    let peer_addr: SocketAddr = "127.0.0.1:34344".parse().unwrap();

    let transport = Transport::new(peer_addr, Some(local_addr)).expect("bind transport");

    println!(">>> Waiting for data on {local_addr}...");
    loop {
        let data = transport.read();

        io::stdout().write_all(&data).unwrap();
        io::stdout().flush().unwrap();

        transport.submit(&data).expect("echo submit");
    }
}
