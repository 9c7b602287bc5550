//! This crate contains generic utilities the `memsched` crate depends upon but
//! that are not specific to request scheduling itself.
//!
//! The main purpose of this crate is to keep `memsched` self-contained.

pub mod log;

pub use log::*;

/// A generic error together with a short diagnostic message.
///
/// This is deliberately not an enum of fine-grained variants: callers that can
/// recover from a failure use a `bool` protocol return (see the port traits in
/// `memsched`), not this type. `Error` only ever surfaces at construction time,
/// where a single descriptive message is all a caller needs to fix its
/// configuration.
#[derive(Debug, Clone)]
pub struct Error {
    message: String,
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}

/// A type alias for `Result<T, memsched_util::Error>`.
pub type Result<T> = core::result::Result<T, Error>;
