// Wire framing: digest, seq, ack_flag, fin_flag, payload. There is no
// length field; the payload is whatever remains after the fixed 22-byte
// header. Everything downstream dispatches on Kind, not the raw flags.

pub const DIGEST_LEN: usize = 16;
pub const HEADER_BODY_LEN: usize = 6; // seq(4) + ack(1) + fin(1)
pub const HEADER_LEN: usize = DIGEST_LEN + HEADER_BODY_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Data,
    Ack,
    Fin,
    FinAck,
}

impl Kind {
    fn from_flags(ack: bool, fin: bool) -> Kind {
        match (ack, fin) {
            (false, false) => Kind::Data,
            (true, false) => Kind::Ack,
            (false, true) => Kind::Fin,
            (true, true) => Kind::FinAck,
        }
    }

    fn flags(self) -> (bool, bool) {
        match self {
            Kind::Data => (false, false),
            Kind::Ack => (true, false),
            Kind::Fin => (false, true),
            Kind::FinAck => (true, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u32,
    pub kind: Kind,
    pub payload: Vec<u8>,
}

// Handled by dropping the datagram; never surfaced to a Transport caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("corrupt packet: digest mismatch")]
pub struct CorruptPacket;

pub fn build(seq: u32, kind: Kind, payload: &[u8]) -> Vec<u8> {
    let (ack, fin) = kind.flags();

    let mut body = Vec::with_capacity(HEADER_BODY_LEN + payload.len());
    body.extend_from_slice(&seq.to_be_bytes());
    body.push(ack as u8);
    body.push(fin as u8);
    body.extend_from_slice(payload);

    let digest = md5::compute(&body);

    let mut datagram = Vec::with_capacity(DIGEST_LEN + body.len());
    datagram.extend_from_slice(&digest.0);
    datagram.extend_from_slice(&body);
    datagram
}

pub fn parse(datagram: &[u8]) -> Result<Frame, CorruptPacket> {
    if datagram.len() < HEADER_LEN {
        return Err(CorruptPacket);
    }

    let (digest, body) = datagram.split_at(DIGEST_LEN);
    if md5::compute(body).0 != digest {
        return Err(CorruptPacket);
    }

    let seq = u32::from_be_bytes(body[0..4].try_into().unwrap());
    let ack = body[4] != 0;
    let fin = body[5] != 0;
    let payload = body[HEADER_BODY_LEN..].to_vec();

    Ok(Frame {
        seq,
        kind: Kind::from_flags(ack, fin),
        payload,
    })
}

// Encodes last_inorder_seq (sentinel -1 meaning nothing received yet)
// into the ACK packet's wire seq field; wire_to_ack_seq undoes it.
pub fn ack_seq_to_wire(last_inorder_seq: i64) -> u32 {
    (last_inorder_seq + 1) as u32
}

pub fn wire_to_ack_seq(wire: u32) -> i64 {
    wire as i64 - 1
}
