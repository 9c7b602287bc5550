//! Thin re-export of the [`log`] facade macros.
//!
//! `memsched` only ever runs hosted inside a discrete-event simulator
//! process, never on bare metal, so there is a single `log` backend, used
//! unconditionally — no feature gate, no no-op fallback.

pub use log::{debug, error, info, trace, warn};
