use std::time::Duration;

// Tunables for a Transport. Correctness does not depend on the exact
// values; the defaults match the reference implementation.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub chunk: usize,
    pub window: usize,
    pub ack_timeout: Duration,
    pub grace: Duration,
    pub poll_interval: Duration,
    // None means close() can block indefinitely if the peer never
    // FIN-ACKs. Some(n) bounds it: close() returns Error::PeerUnreachable
    // after n retransmits without a FIN-ACK.
    pub max_fin_retries: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk: 1024,
            window: 10,
            ack_timeout: Duration::from_millis(200),
            grace: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
            max_fin_retries: None,
        }
    }
}
