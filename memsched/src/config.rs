//! Scheduler configuration and its validation (C8, §6, §10.3).
//!
//! Parsing configuration text or wiring it to a host simulator's own
//! parameter system is out of scope (§1); `Config` is a plain struct the
//! embedding simulator populates directly, then hands to [`crate::Scheduler::new`].

use memsched_util::Error;

/// A configuration error discovered at construction time: a non-positive
/// buffer size or port count. Returned rather than panicked, unlike the
/// post-construction configuration errors in §7 (an unroutable address),
/// because at this point no port or event has been created yet and the host
/// can still abort on its own terms.
pub type ConfigError = Error;

/// A reasonable default `service_interval` for a top-level scheduler driving
/// a handful of channels.
pub const DEFAULT_SERVICE_INTERVAL: crate::packet::Tick = 10_000;

/// A reasonable default `response_interval`, an order of magnitude finer
/// than [`DEFAULT_SERVICE_INTERVAL`].
pub const DEFAULT_RESPONSE_INTERVAL: crate::packet::Tick = 100;

/// Every configuration parameter enumerated in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    pub resp_buffer_size: usize,
    pub nbr_cpus: usize,
    pub nbr_channels: usize,
    pub service_interval: crate::packet::Tick,
    pub response_interval: crate::packet::Tick,
}

impl Config {
    /// Validates and constructs a [`Config`].
    ///
    /// Fails if any buffer size or port count is zero: a zero-sized buffer
    /// can never accept a single packet and a topology with no requestors or
    /// no channels is not a valid degenerate case (§10.3).
    pub fn new(
        read_buffer_size: usize,
        write_buffer_size: usize,
        resp_buffer_size: usize,
        nbr_cpus: usize,
        nbr_channels: usize,
        service_interval: crate::packet::Tick,
        response_interval: crate::packet::Tick,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            read_buffer_size,
            write_buffer_size,
            resp_buffer_size,
            nbr_cpus,
            nbr_channels,
            service_interval,
            response_interval,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.read_buffer_size == 0 {
            return Err(Error::new("read_buffer_size must be non-zero"));
        }
        if self.write_buffer_size == 0 {
            return Err(Error::new("write_buffer_size must be non-zero"));
        }
        if self.resp_buffer_size == 0 {
            return Err(Error::new("resp_buffer_size must be non-zero"));
        }
        if self.nbr_cpus == 0 {
            return Err(Error::new("nbr_cpus must be non-zero"));
        }
        if self.nbr_channels == 0 {
            return Err(Error::new("nbr_channels must be non-zero"));
        }
        Ok(())
    }
}
