//! # Supervisor runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervisor runtime.
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `TaskSupervisor::new(config)`
//! 2. **OperationSpec defaults**: `OperationSpec::with_defaults(op, &config)`
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global limiter created)
//! - `timeout = 0s` → no deadline (treated as `None` by `OperationSpec::with_defaults`)

use std::time::Duration;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: Maximum wait for operations to stop during shutdown (`0s` = don't wait)
/// - `max_concurrent`: Supervisor-wide concurrency limit (`0` = unlimited)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `timeout`: Default per-operation deadline (`0s` = no deadline)
///
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for graceful shutdown.
    ///
    /// On shutdown every live operation is cancelled through its token and the
    /// supervisor waits up to `grace` for them to acknowledge. Past that,
    /// `shutdown()` returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Maximum number of operation bodies running at once.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = a supervisor-wide `ConcurrencyLimiter(n)` is applied to every operation
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Default operation deadline.
    ///
    /// - `Duration::ZERO` = no deadline
    /// - `> 0` = applied through `OperationSpec::with_defaults()`
    pub timeout: Duration,
}

impl Config {
    /// Returns the global concurrency limit as an `Option`.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the default per-operation deadline as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `timeout = 0s` (no deadline)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            max_concurrent: 0,
            bus_capacity: 1024,
            timeout: Duration::ZERO,
        }
    }
}
