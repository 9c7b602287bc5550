//! A multi-requestor memory request scheduler: routes read and write packets
//! from any number of requestor ports to the memory channel that owns their
//! address, fairly arbitrating among requestors with per-requestor buffering
//! and a four-way back-pressure/retry handshake on both the request and
//! response paths.
//!
//! `memsched` owns no clock and drives no event loop of its own — see
//! [`EventScheduler`] for the boundary with the host discrete-event simulator
//! that does. Construct a [`Scheduler`] with a validated [`Config`] and a set
//! of [`UpstreamPort`]/[`DownstreamPort`] peers, then forward the host's port
//! callbacks and scheduled-event callbacks to the matching `Scheduler`
//! methods.

mod arbiter;
mod buffers;
mod config;
mod event;
mod packet;
mod port;
mod range;
mod response_pump;
mod scheduler;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError, DEFAULT_RESPONSE_INTERVAL, DEFAULT_SERVICE_INTERVAL};
pub use event::{EventScheduler, SchedulerEvent};
pub use packet::{ChannelId, Kind, Packet, RequestorId, Tick};
pub use port::{DownstreamPort, UpstreamPort};
pub use range::AddressRange;
pub use scheduler::Scheduler;
