//! Drains the response queue to the correct requestor port (C6, §4.6).
//!
//! Unlike the arbiter, the pump needs no cursor: it always inspects the
//! single shared `resp_queue`'s head, which is already the correct FIFO
//! order (§4.6 step 1).

use std::collections::BTreeMap;

use crate::buffers::Buffers;
use crate::packet::RequestorId;
use crate::port::RequestorPortState;

/// The outcome of one response pump firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// A response was popped and delivered; the caller should reschedule at
    /// `now + response_interval` if the queue is still non-empty.
    Dispatched,
    /// The head response's requestor is currently blocked (an earlier
    /// delivery attempt was refused and hasn't been retried yet, or this
    /// attempt was itself refused). The caller must not reschedule; only
    /// `recv_response_retry` re-arms the pump.
    BlockedOnRequestor,
    /// The response queue was empty; nothing to do.
    Empty,
}

/// One firing of the response pump (§4.6 steps 1-4). Step 5 (deciding
/// whether to reschedule) is the caller's responsibility since it also needs
/// to know `response_interval`, which the pump itself has no opinion on.
pub fn fire(
    buffers: &mut Buffers,
    requestors: &mut BTreeMap<RequestorId, RequestorPortState>,
) -> PumpOutcome {
    let pkt = match buffers.resp_peek_front() {
        Some(pkt) => *pkt,
        None => return PumpOutcome::Empty,
    };

    let rid = pkt.requestor_id;
    let requestor = requestors.get_mut(&rid).unwrap_or_else(|| {
        panic!(
            "protocol invariant violation: response queued for unregistered requestor {}",
            rid
        )
    });

    if requestor.resp_blocked() {
        return PumpOutcome::BlockedOnRequestor;
    }

    if !requestor.send_response(pkt) {
        return PumpOutcome::BlockedOnRequestor;
    }

    buffers.pop_response();
    PumpOutcome::Dispatched
}
