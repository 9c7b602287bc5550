//! The boundary between the scheduler and the host simulator's event loop
//! and global clock (explicitly out of scope per §1 — the scheduler only
//! ever calls `schedule`, it never drives time itself).

use crate::packet::Tick;

/// The two recurring events `memsched` owns (§5): the arbiter and the
/// response pump. The host simulator is responsible for calling
/// [`crate::Scheduler::fire_arbiter`] / [`crate::Scheduler::fire_response_pump`]
/// back when a scheduled tick arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    Arbiter,
    ResponsePump,
}

/// The host simulator's clock, as seen by the scheduler.
///
/// `memsched` never reads the current time on its own and never blocks;
/// every deferred action is expressed as a call to `schedule`. A handler may
/// call `schedule` but, per §5, must never recursively invoke another
/// handler — the host is expected to run scheduled events through its own
/// event loop, not as a direct recursive call from within `schedule`.
pub trait EventScheduler {
    fn schedule(&mut self, at: Tick, event: SchedulerEvent);
}
