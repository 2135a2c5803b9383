use std::sync::atomic::{AtomicBool, Ordering};

/*
    INITIATOR: ACTIVE -> FIN_SENT -> WAIT_FIN_ACK -> GRACE -> CLOSED
    RESPONDER: ACTIVE -> FIN_RECEIVED (sends FIN-ACK) -> stays ACTIVE
               until its own close() is invoked.

    The responder side needs no state of its own: every received FIN gets
    a FIN-ACK regardless of what came before, so a retransmitted peer FIN
    is answered again for free. Only the initiator side below is tracked.
*/

// closed is the cancellation signal both background loops poll between
// iterations.
pub(crate) struct Teardown {
    fin_acked: AtomicBool,
    closed: AtomicBool,
}

impl Teardown {
    pub fn new() -> Self {
        Teardown {
            fin_acked: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn set_fin_acked(&self) {
        self.fin_acked.store(true, Ordering::Release);
    }

    pub fn is_fin_acked(&self) -> bool {
        self.fin_acked.load(Ordering::Acquire)
    }

    pub fn set_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
