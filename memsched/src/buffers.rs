//! Per-requestor read/write queues, their blocked flags, and the single
//! response queue (C3).

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;

use crate::packet::{Kind, Packet, RequestorId};

/// Owns every buffered packet the scheduler has accepted but not yet
/// delivered, split into per-requestor read and write queues plus a single
/// shared response queue.
///
/// Per-requestor queues are kept in a [`BTreeMap`] rather than a hash map so
/// that the round-robin cursor (see [`Buffers::next_requestor_after`]) can be
/// expressed as "the next key greater than the cursor, wrapping to the
/// smallest key" without the cursor being invalidated by requestors that are
/// registered lazily, after the cursor has already started its rotation (see
/// the design note on cursor iterator invalidation).
#[derive(Debug)]
pub struct Buffers {
    read_capacity: usize,
    write_capacity: usize,
    resp_capacity: usize,
    read_queues: BTreeMap<RequestorId, VecDeque<Packet>>,
    write_queues: BTreeMap<RequestorId, VecDeque<Packet>>,
    read_blocked: BTreeMap<RequestorId, bool>,
    write_blocked: BTreeMap<RequestorId, bool>,
    resp_queue: VecDeque<Packet>,
    resp_blocked: bool,
}

impl Buffers {
    pub fn new(read_capacity: usize, write_capacity: usize, resp_capacity: usize) -> Self {
        Self {
            read_capacity,
            write_capacity,
            resp_capacity,
            read_queues: BTreeMap::new(),
            write_queues: BTreeMap::new(),
            read_blocked: BTreeMap::new(),
            write_blocked: BTreeMap::new(),
            resp_queue: VecDeque::new(),
            resp_blocked: false,
        }
    }

    pub fn capacity(&self, kind: Kind) -> usize {
        match kind {
            Kind::Read => self.read_capacity,
            Kind::Write => self.write_capacity,
        }
    }

    pub fn is_blocked(&self, kind: Kind, rid: RequestorId) -> bool {
        match kind {
            Kind::Read => self.read_blocked.get(&rid).copied().unwrap_or(false),
            Kind::Write => self.write_blocked.get(&rid).copied().unwrap_or(false),
        }
    }

    pub fn queue_len(&self, kind: Kind, rid: RequestorId) -> usize {
        match kind {
            Kind::Read => self.read_queues.get(&rid).map_or(0, VecDeque::len),
            Kind::Write => self.write_queues.get(&rid).map_or(0, VecDeque::len),
        }
    }

    pub fn peek_front(&self, kind: Kind, rid: RequestorId) -> Option<&Packet> {
        match kind {
            Kind::Read => self.read_queues.get(&rid).and_then(VecDeque::front),
            Kind::Write => self.write_queues.get(&rid).and_then(VecDeque::front),
        }
    }

    /// Steps 2-5 of the ingress algorithm (§4.4): refuses if the target queue
    /// is blocked, otherwise enqueues and sets the blocked flag if the queue
    /// just reached capacity.
    ///
    /// Step 1 (retry-table registration) and steps 6-7 (arbiter scheduling,
    /// returning `true`) are the caller's responsibility, since they involve
    /// the requestor port and the event scheduler, neither of which `Buffers`
    /// knows about.
    pub fn try_enqueue(&mut self, pkt: Packet) -> bool {
        let rid = pkt.requestor_id;
        let kind = pkt.kind;
        if self.is_blocked(kind, rid) {
            return false;
        }
        let (queues, blocked, capacity) = match kind {
            Kind::Read => (&mut self.read_queues, &mut self.read_blocked, self.read_capacity),
            Kind::Write => (
                &mut self.write_queues,
                &mut self.write_blocked,
                self.write_capacity,
            ),
        };
        let queue = queues.entry(rid).or_default();
        queue.push_back(pkt);
        if queue.len() >= capacity {
            blocked.insert(rid, true);
        } else {
            blocked.entry(rid).or_insert(false);
        }
        true
    }

    /// Pops the head packet of `(kind, rid)` for dispatch. Returns the packet
    /// together with whether the queue's blocked flag was just cleared
    /// (i.e. the queue transitioned from full to not-full), in which case the
    /// caller must retry-notify that requestor.
    pub fn pop_for_dispatch(&mut self, kind: Kind, rid: RequestorId) -> Option<(Packet, bool)> {
        let (queues, blocked, capacity) = match kind {
            Kind::Read => (&mut self.read_queues, &mut self.read_blocked, self.read_capacity),
            Kind::Write => (
                &mut self.write_queues,
                &mut self.write_blocked,
                self.write_capacity,
            ),
        };
        let queue = queues.get_mut(&rid)?;
        let was_full = queue.len() == capacity;
        let pkt = queue.pop_front()?;
        let mut cleared = false;
        if was_full {
            if let Some(flag) = blocked.get_mut(&rid) {
                if *flag {
                    *flag = false;
                    cleared = true;
                }
            }
        }
        Some((pkt, cleared))
    }

    /// Returns the next known requestor id after `after` for the given class,
    /// wrapping to the smallest known id. `None` if no requestor has ever
    /// enqueued a packet of that class.
    pub fn next_requestor_after(&self, kind: Kind, after: Option<RequestorId>) -> Option<RequestorId> {
        let queues = match kind {
            Kind::Read => &self.read_queues,
            Kind::Write => &self.write_queues,
        };
        if queues.is_empty() {
            return None;
        }
        match after {
            Some(rid) => queues
                .range((Bound::Excluded(rid), Bound::Unbounded))
                .next()
                .or_else(|| queues.iter().next())
                .map(|(&rid, _)| rid),
            None => queues.keys().next().copied(),
        }
    }

    /// Returns the known requestor id immediately before `rid` for the given
    /// class, wrapping to the largest known id. Used to prime the
    /// round-robin cursor so the *next* firing's mandatory single advance
    /// lands on `rid` (see the ingress step that arms the arbiter).
    pub fn requestor_before(&self, kind: Kind, rid: RequestorId) -> Option<RequestorId> {
        let queues = match kind {
            Kind::Read => &self.read_queues,
            Kind::Write => &self.write_queues,
        };
        queues
            .range((Bound::Unbounded, Bound::Excluded(rid)))
            .next_back()
            .or_else(|| queues.iter().next_back())
            .map(|(&rid, _)| rid)
    }

    pub fn resp_capacity(&self) -> usize {
        self.resp_capacity
    }

    pub fn resp_is_blocked(&self) -> bool {
        self.resp_blocked
    }

    pub fn resp_len(&self) -> usize {
        self.resp_queue.len()
    }

    pub fn resp_peek_front(&self) -> Option<&Packet> {
        self.resp_queue.front()
    }

    /// Response ingress (§4.6): refuses if `resp_blocked`, else enqueues and
    /// sets `resp_blocked` if capacity was just reached.
    pub fn try_enqueue_response(&mut self, pkt: Packet) -> bool {
        if self.resp_blocked {
            return false;
        }
        self.resp_queue.push_back(pkt);
        if self.resp_queue.len() >= self.resp_capacity {
            self.resp_blocked = true;
        }
        true
    }

    /// Pops the head of the response queue, clearing `resp_blocked` if the
    /// queue had been at capacity.
    pub fn pop_response(&mut self) -> Option<Packet> {
        let was_full = self.resp_queue.len() == self.resp_capacity;
        let pkt = self.resp_queue.pop_front();
        if pkt.is_some() && was_full {
            self.resp_blocked = false;
        }
        pkt
    }
}
