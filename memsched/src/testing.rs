//! Scriptable test doubles for [`crate::port::UpstreamPort`],
//! [`crate::port::DownstreamPort`] and [`crate::event::EventScheduler`],
//! reused across the per-component test modules and the end-to-end scenario
//! tests (§10.4).
//!
//! Only ever compiled for tests (`mod testing;` in `lib.rs` is
//! `#[cfg(test)]`), so these types are not part of the public API.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{EventScheduler, SchedulerEvent};
use crate::packet::{Packet, Tick};
use crate::port::{DownstreamPort, UpstreamPort};
use crate::range::AddressRange;

#[derive(Debug, Default)]
pub struct UpstreamCallLog {
    pub responses: Vec<Packet>,
    pub retries: usize,
    pub range_changes: usize,
}

/// A requestor peer double whose response acceptance is scriptable. The
/// accept flag lives behind the same `Rc<RefCell<_>>` handed back as
/// [`UpstreamCalls`], so a test can keep flipping it after the double itself
/// has been boxed and moved into a `Scheduler`.
pub struct RecordingUpstream {
    accept_response: Rc<RefCell<bool>>,
    log: Rc<RefCell<UpstreamCallLog>>,
}

#[derive(Clone)]
pub struct UpstreamCalls {
    accept_response: Rc<RefCell<bool>>,
    log: Rc<RefCell<UpstreamCallLog>>,
}

impl UpstreamCalls {
    pub fn retries(&self) -> usize {
        self.log.borrow().retries
    }

    pub fn range_changes(&self) -> usize {
        self.log.borrow().range_changes
    }

    pub fn responses(&self) -> Vec<Packet> {
        self.log.borrow().responses.clone()
    }

    pub fn set_accept_response(&self, accept: bool) {
        *self.accept_response.borrow_mut() = accept;
    }
}

impl RecordingUpstream {
    pub fn new(accept_response: bool) -> (Self, UpstreamCalls) {
        let accept_response = Rc::new(RefCell::new(accept_response));
        let log = Rc::new(RefCell::new(UpstreamCallLog::default()));
        (
            Self {
                accept_response: accept_response.clone(),
                log: log.clone(),
            },
            UpstreamCalls { accept_response, log },
        )
    }
}

impl UpstreamPort for RecordingUpstream {
    fn send_timing_response(&mut self, pkt: Packet) -> bool {
        self.log.borrow_mut().responses.push(pkt);
        *self.accept_response.borrow()
    }

    fn send_retry_request(&mut self) {
        self.log.borrow_mut().retries += 1;
    }

    fn send_range_change(&mut self) {
        self.log.borrow_mut().range_changes += 1;
    }
}

#[derive(Debug, Default)]
pub struct DownstreamCallLog {
    pub requests: Vec<Packet>,
    pub functional: Vec<Packet>,
}

/// A channel peer double whose request acceptance and advertised ranges are
/// scriptable. Like [`RecordingUpstream`], the accept flag is shared with
/// [`DownstreamCalls`] so a test can flip it after the double has been moved
/// into a `Scheduler`.
pub struct RecordingDownstream {
    accept_request: Rc<RefCell<bool>>,
    ranges: Vec<AddressRange>,
    log: Rc<RefCell<DownstreamCallLog>>,
}

#[derive(Clone)]
pub struct DownstreamCalls {
    accept_request: Rc<RefCell<bool>>,
    log: Rc<RefCell<DownstreamCallLog>>,
}

impl DownstreamCalls {
    pub fn requests(&self) -> Vec<Packet> {
        self.log.borrow().requests.clone()
    }

    pub fn functional(&self) -> Vec<Packet> {
        self.log.borrow().functional.clone()
    }

    pub fn set_accept_request(&self, accept: bool) {
        *self.accept_request.borrow_mut() = accept;
    }
}

impl RecordingDownstream {
    pub fn new(accept_request: bool, ranges: Vec<AddressRange>) -> (Self, DownstreamCalls) {
        let accept_request = Rc::new(RefCell::new(accept_request));
        let log = Rc::new(RefCell::new(DownstreamCallLog::default()));
        (
            Self {
                accept_request: accept_request.clone(),
                ranges,
                log: log.clone(),
            },
            DownstreamCalls { accept_request, log },
        )
    }
}

impl DownstreamPort for RecordingDownstream {
    fn send_timing_request(&mut self, pkt: Packet) -> bool {
        self.log.borrow_mut().requests.push(pkt);
        *self.accept_request.borrow()
    }

    fn send_functional(&mut self, pkt: Packet) {
        self.log.borrow_mut().functional.push(pkt);
    }

    fn address_ranges(&self) -> Vec<AddressRange> {
        self.ranges.clone()
    }
}

/// Records every `schedule` call without actually running an event loop;
/// scenario tests drive the scheduler by calling `fire_arbiter` /
/// `fire_response_pump` directly once they observe an event was scheduled.
#[derive(Debug, Default)]
pub struct RecordingEventScheduler {
    pub scheduled: Vec<(Tick, SchedulerEvent)>,
}

impl RecordingEventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_scheduled(&self, event: SchedulerEvent) -> bool {
        self.scheduled.iter().any(|(_, e)| *e == event)
    }

    pub fn clear(&mut self) {
        self.scheduled.clear();
    }
}

impl EventScheduler for RecordingEventScheduler {
    fn schedule(&mut self, at: Tick, event: SchedulerEvent) {
        self.scheduled.push((at, event));
    }
}
