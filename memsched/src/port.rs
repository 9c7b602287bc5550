//! Requestor ports (C1) and channel ports (C2): the two halves of the
//! back-pressure protocol described in §4.1-4.2 and §6.
//!
//! Upstream and downstream peers are supplied by the host simulator as trait
//! objects. `memsched` never constructs them; it only calls into them and
//! tracks the small amount of state (`needs_retry`, `resp_blocked`,
//! `blocked_source`) the protocol requires on its own side of the boundary.

use memsched_util::{debug, warn};

use crate::packet::{ChannelId, Kind, Packet, RequestorId};
use crate::range::AddressRange;

/// The operations the scheduler invokes on an upstream requestor peer.
pub trait UpstreamPort {
    /// Delivers a response. Returns whether the peer accepted it.
    fn send_timing_response(&mut self, pkt: Packet) -> bool;
    /// Signals that a previously refused request may be retried.
    fn send_retry_request(&mut self);
    /// Signals that the aggregate downstream address ranges changed.
    fn send_range_change(&mut self);
}

/// The operations the scheduler invokes on a downstream channel peer.
pub trait DownstreamPort {
    /// Delivers a request. Returns whether the peer accepted it.
    fn send_timing_request(&mut self, pkt: Packet) -> bool;
    /// Delivers a functional (debug) access. No return value: functional
    /// accesses are not subject to back-pressure.
    fn send_functional(&mut self, pkt: Packet);
    /// The address ranges this channel currently advertises.
    fn address_ranges(&self) -> Vec<AddressRange>;
}

/// Identifies which queue a channel's blocked packet was drawn from, so a
/// later retry can be satisfied from the same queue (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedSource {
    pub kind: Kind,
    pub requestor_id: RequestorId,
}

/// Per-requestor state for C1: the `needs_retry` flag from §3, plus a
/// `resp_blocked` flag tracking whether the last response delivery attempt to
/// this requestor was refused (§4.6). The two are independent: a requestor
/// can simultaneously be owed a request-side retry and be blocked on the
/// response side.
pub struct RequestorPortState {
    id: RequestorId,
    upstream: Box<dyn UpstreamPort>,
    needs_retry: bool,
    resp_blocked: bool,
}

impl RequestorPortState {
    pub fn new(id: RequestorId, upstream: Box<dyn UpstreamPort>) -> Self {
        Self {
            id,
            upstream,
            needs_retry: false,
            resp_blocked: false,
        }
    }

    pub fn id(&self) -> RequestorId {
        self.id
    }

    pub fn mark_needs_retry(&mut self) {
        self.needs_retry = true;
    }

    /// §4.1: if `needs_retry` is set, emit an upstream retry signal and clear
    /// the flag. At most one retry is emitted per refused-then-freed cycle.
    pub fn try_send_retry(&mut self) {
        if self.needs_retry {
            self.needs_retry = false;
            debug!("requestor {}: emitting retry request", self.id);
            self.upstream.send_retry_request();
        }
    }

    pub fn send_range_change(&mut self) {
        self.upstream.send_range_change();
    }

    pub fn resp_blocked(&self) -> bool {
        self.resp_blocked
    }

    /// Attempts to deliver `pkt` to this requestor. Records whether the
    /// attempt was refused so the response pump knows to wait for
    /// `clear_resp_blocked` (driven by `recv_response_retry`) before trying
    /// again.
    pub fn send_response(&mut self, pkt: Packet) -> bool {
        let accepted = self.upstream.send_timing_response(pkt);
        if accepted {
            debug!(
                "requestor {}: delivered response for addr {:#x}",
                self.id, pkt.address
            );
        } else {
            warn!(
                "requestor {}: response delivery refused for addr {:#x}",
                self.id, pkt.address
            );
        }
        self.resp_blocked = !accepted;
        accepted
    }

    pub fn clear_resp_blocked(&mut self) {
        self.resp_blocked = false;
    }
}

/// Per-channel state for C2: at most one outstanding-blocked packet,
/// identified by the queue it was drawn from.
pub struct ChannelPortState {
    id: ChannelId,
    downstream: Box<dyn DownstreamPort>,
    blocked_source: Option<BlockedSource>,
}

impl ChannelPortState {
    pub fn new(id: ChannelId, downstream: Box<dyn DownstreamPort>) -> Self {
        Self {
            id,
            downstream,
            blocked_source: None,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_source.is_some()
    }

    pub fn blocked_source(&self) -> Option<BlockedSource> {
        self.blocked_source
    }

    /// §4.2 `send`: precondition `blocked_source == None`, enforced as a
    /// protocol invariant violation (fatal, per §7) rather than a silent
    /// no-op, since a caller that calls `send` on a blocked channel has a
    /// bug in its dispatch bookkeeping.
    pub fn send(&mut self, pkt: Packet, source: BlockedSource) -> bool {
        assert!(
            self.blocked_source.is_none(),
            "protocol invariant violation: attempted send on channel {} while blocked",
            self.id
        );
        let accepted = self.downstream.send_timing_request(pkt);
        if accepted {
            debug!(
                "channel {}: delivered request for addr {:#x}",
                self.id, pkt.address
            );
        } else {
            warn!(
                "channel {}: request delivery refused for addr {:#x}",
                self.id, pkt.address
            );
            self.blocked_source = Some(source);
        }
        accepted
    }

    /// §4.2 `on_downstream_retry` precondition: takes and clears the
    /// recorded blocked source. Panics (protocol invariant violation) if the
    /// channel reports a retry without having a blocked packet.
    pub fn take_blocked_source(&mut self) -> BlockedSource {
        self.blocked_source.take().unwrap_or_else(|| {
            panic!(
                "protocol invariant violation: channel {} signalled a retry with no blocked packet",
                self.id
            )
        })
    }

    pub fn send_functional(&mut self, pkt: Packet) {
        self.downstream.send_functional(pkt);
    }

    pub fn address_ranges(&self) -> Vec<AddressRange> {
        self.downstream.address_ranges()
    }
}
