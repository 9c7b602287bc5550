//! Round-robin arbitration over per-requestor queues (C5).

use std::collections::BTreeMap;

use memsched_util::trace;

use crate::buffers::Buffers;
use crate::packet::{ChannelId, Kind, RequestorId};
use crate::port::{BlockedSource, ChannelPortState, RequestorPortState};
use crate::range::Router;

/// Owns the two round-robin cursors (read, write) described in §3. Each
/// cursor is the last-serviced requestor id, not a map iterator, so it
/// survives requestors being registered lazily after the cursor has started
/// rotating (see the design note on cursor iterator invalidation).
#[derive(Debug, Default)]
pub struct Arbiter {
    read_cursor: Option<RequestorId>,
    write_cursor: Option<RequestorId>,
    /// Set by [`Arbiter::request_priming`] when an ingress arms the arbiter;
    /// resolved to an actual cursor position lazily, the next time
    /// [`Arbiter::dispatch_class`] runs for that class. Deferring the
    /// resolution (rather than computing `requestor_before` immediately
    /// against the buffer snapshot at ingress time) matters because further
    /// ingresses for *other* requestors can still land before the arbiter
    /// actually fires; resolving against the snapshot at fire time is the
    /// only way the just-enqueued requestor reliably ends up the next
    /// candidate inspected, per ingress step 6.
    pending_read_prime: Option<RequestorId>,
    pending_write_prime: Option<RequestorId>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn cursor_mut(&mut self, kind: Kind) -> &mut Option<RequestorId> {
        match kind {
            Kind::Read => &mut self.read_cursor,
            Kind::Write => &mut self.write_cursor,
        }
    }

    fn pending_prime_mut(&mut self, kind: Kind) -> &mut Option<RequestorId> {
        match kind {
            Kind::Read => &mut self.pending_read_prime,
            Kind::Write => &mut self.pending_write_prime,
        }
    }

    /// Ingress step 6: "point the relevant cursor at `rid` so the
    /// just-enqueued requestor is the next candidate inspected after the
    /// mandatory cursor advance". Recorded for resolution at the next
    /// `dispatch_class` call for `kind`, not computed now (see the field doc
    /// on `pending_read_prime`/`pending_write_prime`).
    pub fn request_priming(&mut self, kind: Kind, rid: RequestorId) {
        *self.pending_prime_mut(kind) = Some(rid);
    }

    /// One firing, for one class (§4.5 steps 1-2). Returns whether a packet
    /// was successfully dispatched. A channel refusal also ends the firing
    /// for this class, whether or not the send was accepted, but does *not*
    /// count as a dispatch: the caller treats it as "no progress" and may
    /// still try the other class in the same firing (§9).
    pub fn dispatch_class(
        &mut self,
        kind: Kind,
        buffers: &mut Buffers,
        router: &Router,
        channels: &mut BTreeMap<ChannelId, ChannelPortState>,
        requestors: &mut BTreeMap<RequestorId, RequestorPortState>,
    ) -> bool {
        if let Some(rid) = self.pending_prime_mut(kind).take() {
            *self.cursor_mut(kind) = buffers.requestor_before(kind, rid);
        }

        let cursor_slot = self.cursor_mut(kind);
        let start = match buffers.next_requestor_after(kind, *cursor_slot) {
            Some(rid) => rid,
            None => return false,
        };

        let mut candidate = start;
        loop {
            *cursor_slot = Some(candidate);

            if let Some(pkt) = buffers.peek_front(kind, candidate).copied() {
                let channel_id = router.route(pkt.address).unwrap_or_else(|| {
                    panic!(
                        "configuration error: address {:#x} matches no channel's advertised range",
                        pkt.address
                    )
                });
                let channel = channels
                    .get_mut(&channel_id)
                    .expect("router referenced a channel id with no registered port");

                if !channel.is_blocked() {
                    let source = BlockedSource {
                        kind,
                        requestor_id: candidate,
                    };
                    let accepted = channel.send(pkt, source);
                    if accepted {
                        let (_, cleared) = buffers
                            .pop_for_dispatch(kind, candidate)
                            .expect("packet just peeked must still be at the queue head");
                        if cleared {
                            if let Some(requestor) = requestors.get_mut(&candidate) {
                                requestor.try_send_retry();
                            }
                        }
                    }
                    return accepted;
                }
                trace!(
                    "arbiter: channel for requestor {} target is blocked, skipping",
                    candidate
                );
            }

            let next = buffers
                .next_requestor_after(kind, Some(candidate))
                .expect("a class with at least one known requestor always has a next candidate");
            if next == start {
                trace!("arbiter: {:?} class completed a full revolution with no dispatch", kind);
                return false;
            }
            candidate = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;
    use crate::testing::RecordingDownstream;

    fn channel(accept: bool) -> BTreeMap<ChannelId, ChannelPortState> {
        let (downstream, _calls) = RecordingDownstream::new(
            accept,
            vec![crate::range::AddressRange::new(0, 0x10000)],
        );
        let mut channels = BTreeMap::new();
        channels.insert(0, ChannelPortState::new(0, Box::new(downstream)));
        channels
    }

    #[test]
    fn dispatches_in_round_robin_order_across_requestors() {
        let mut buffers = Buffers::new(8, 8, 8);
        for rid in [1usize, 2, 3] {
            for _ in 0..4 {
                buffers.try_enqueue(Packet::read(0x0, rid));
            }
        }
        let mut router = Router::new();
        router.rebuild(&[vec![crate::range::AddressRange::new(0, 0x10000)]]);
        let mut channels = channel(true);
        let mut requestors: BTreeMap<RequestorId, RequestorPortState> = BTreeMap::new();

        let mut arbiter = Arbiter::new();
        let mut order = Vec::new();
        for _ in 0..12 {
            let before: Vec<_> = [1usize, 2, 3]
                .iter()
                .map(|&rid| buffers.queue_len(Kind::Read, rid))
                .collect();
            assert!(arbiter.dispatch_class(
                Kind::Read,
                &mut buffers,
                &router,
                &mut channels,
                &mut requestors,
            ));
            let serviced = [1usize, 2, 3]
                .into_iter()
                .zip(before)
                .find(|&(rid, len_before)| buffers.queue_len(Kind::Read, rid) < len_before)
                .map(|(rid, _)| rid)
                .expect("exactly one requestor loses a packet per dispatch");
            order.push(serviced);
        }
        assert_eq!(order, vec![1, 2, 3, 1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn blocked_channel_is_skipped_and_firing_reports_no_progress() {
        let mut buffers = Buffers::new(4, 4, 4);
        buffers.try_enqueue(Packet::read(0x0, 1));
        let mut router = Router::new();
        router.rebuild(&[vec![crate::range::AddressRange::new(0, 0x10000)]]);
        let mut channels = channel(false);
        let mut requestors: BTreeMap<RequestorId, RequestorPortState> = BTreeMap::new();

        let mut arbiter = Arbiter::new();
        let dispatched = arbiter.dispatch_class(
            Kind::Read,
            &mut buffers,
            &router,
            &mut channels,
            &mut requestors,
        );
        assert!(!dispatched);
        // The packet was handed to `send`, which recorded it as blocked, but
        // it was not popped from the originating queue.
        assert_eq!(buffers.queue_len(Kind::Read, 1), 1);
        assert!(channels.get(&0).unwrap().is_blocked());
    }

    #[test]
    fn dispatch_clears_blocked_flag_and_requests_a_retry() {
        let mut buffers = Buffers::new(1, 1, 1);
        buffers.try_enqueue(Packet::read(0x0, 1));
        assert!(buffers.is_blocked(Kind::Read, 1));

        let mut router = Router::new();
        router.rebuild(&[vec![crate::range::AddressRange::new(0, 0x10000)]]);
        let mut channels = channel(true);

        let (upstream, calls) = crate::testing::RecordingUpstream::new(true);
        let mut requestors = BTreeMap::new();
        requestors.insert(1, RequestorPortState::new(1, Box::new(upstream)));

        let mut arbiter = Arbiter::new();
        assert!(arbiter.dispatch_class(Kind::Read, &mut buffers, &router, &mut channels, &mut requestors));
        assert!(!buffers.is_blocked(Kind::Read, 1));
        assert_eq!(calls.retries(), 1);
    }

    #[test]
    fn empty_class_reports_no_progress_without_touching_cursor() {
        let mut buffers = Buffers::new(4, 4, 4);
        let router = Router::new();
        let mut channels: BTreeMap<ChannelId, ChannelPortState> = BTreeMap::new();
        let mut requestors: BTreeMap<RequestorId, RequestorPortState> = BTreeMap::new();
        let mut arbiter = Arbiter::new();
        assert!(!arbiter.dispatch_class(Kind::Write, &mut buffers, &router, &mut channels, &mut requestors));
    }
}
