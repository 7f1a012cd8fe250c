//! # Operation specification for supervised execution.
//!
//! Defines [`OperationSpec`] a bundle that describes how an operation should be
//! executed under supervision (deadline, concurrency limiter).
//!
//! A spec can be created:
//! - **Explicitly** with [`OperationSpec::new`] (no deadline, no limiter)
//! - **From config** with [`OperationSpec::with_defaults`] (inherit the default deadline)
//!
//! ## Rules
//! - The spec is passed to [`TaskSupervisor::spawn`](crate::TaskSupervisor::spawn).
//! - The limiter permit is taken **before** the deadline starts ticking, so time spent
//!   queueing for a permit never counts against the operation's deadline.

use std::time::Duration;

use crate::{core::Config, sync::ConcurrencyLimiter, tasks::task::OperationRef};

/// Specification for running an operation under supervision.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use tasklane::{ConcurrencyLimiter, OperationFn, OperationRef, OperationSpec, TaskError};
///
/// let op: OperationRef<()> = OperationFn::arc("demo", |_ctx: CancellationToken| async move {
///     Ok::<(), TaskError>(())
/// });
///
/// let limiter = ConcurrencyLimiter::new(2).unwrap();
/// let spec = OperationSpec::new(op)
///     .with_timeout(Some(Duration::from_secs(1)))
///     .with_limiter(limiter);
///
/// assert_eq!(spec.timeout(), Some(Duration::from_secs(1)));
/// assert!(spec.limiter().is_some());
/// ```
pub struct OperationSpec<T> {
    op: OperationRef<T>,
    timeout: Option<Duration>,
    limiter: Option<ConcurrencyLimiter>,
}

impl<T> Clone for OperationSpec<T> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            timeout: self.timeout,
            limiter: self.limiter.clone(),
        }
    }
}

impl<T: Send + 'static> OperationSpec<T> {
    /// Creates a spec with no deadline and no limiter.
    pub fn new(op: OperationRef<T>) -> Self {
        Self {
            op,
            timeout: None,
            limiter: None,
        }
    }

    /// Creates a spec inheriting the default deadline from config.
    ///
    /// Uses `Config::default_timeout()` so that `0s` in config is treated as `None`.
    pub fn with_defaults(op: OperationRef<T>, cfg: &Config) -> Self {
        Self {
            op,
            timeout: cfg.default_timeout(),
            limiter: None,
        }
    }

    /// Returns reference to the operation.
    pub fn op(&self) -> &OperationRef<T> {
        &self.op
    }

    /// Convenience: returns the operation name.
    pub fn name(&self) -> &str {
        self.op.name()
    }

    /// Returns the deadline, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the limiter, if configured.
    pub fn limiter(&self) -> Option<&ConcurrencyLimiter> {
        self.limiter.as_ref()
    }

    /// Returns a new spec with updated deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a new spec that runs its body under `limiter`.
    pub fn with_limiter(mut self, limiter: ConcurrencyLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }
}
