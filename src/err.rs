#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot build packet for seq {seq}: {reason}")]
    BuildPacketFailure { seq: u32, reason: &'static str },

    #[error("peer unreachable: FIN retransmit limit exceeded")]
    PeerUnreachable,
}
