//! Error types used by the tasklane runtime, its operations and the line transport.
//!
//! This module defines three error enums:
//!
//! - [`RuntimeError`]: usage and lifecycle errors raised synchronously by the runtime.
//! - [`TaskError`]: errors raised by individual operations (captured into outcomes).
//! - [`NetError`]: transport-boundary errors surfaced by the line protocol endpoint.
//!
//! All types provide `as_label` for logs/metrics.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the tasklane runtime.
///
/// These are programmer-usage errors (bad configuration, unknown handle,
/// use of a closed queue) and lifecycle failures such as a shutdown
/// exceeding its grace period. They are raised at the offending call,
/// never captured into an [`Outcome`](crate::Outcome).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A primitive was constructed with an impossible parameter.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// The handle does not belong to this supervisor.
    #[error("unknown operation handle #{id}")]
    UnknownHandle {
        /// Identifier carried by the rejected handle.
        id: u64,
    },

    /// The handle was already passed to a previous `gather_all`.
    #[error("operation #{id} was already gathered")]
    AlreadyGathered {
        /// Identifier carried by the rejected handle.
        id: u64,
    },

    /// The queue was closed; no new items are accepted and it has drained.
    #[error("queue is shut down")]
    QueueShutdown,

    /// The concurrency limiter was closed while waiting for a permit.
    #[error("concurrency limiter is closed")]
    LimiterClosed,

    /// Shutdown grace period was exceeded; some operations remained stuck.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of operations that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tasklane::RuntimeError;
    ///
    /// let err = RuntimeError::UnknownHandle { id: 7 };
    /// assert_eq!(err.as_label(), "runtime_unknown_handle");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidConfiguration { .. } => "runtime_invalid_configuration",
            RuntimeError::UnknownHandle { .. } => "runtime_unknown_handle",
            RuntimeError::AlreadyGathered { .. } => "runtime_already_gathered",
            RuntimeError::QueueShutdown => "runtime_queue_shutdown",
            RuntimeError::LimiterClosed => "runtime_limiter_closed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        RuntimeError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by operation execution.
///
/// An operation body returns `Err(TaskError::Fail { .. })` when its own logic
/// fails and `Err(TaskError::Canceled)` to acknowledge a cancellation request.
/// `Timeout` is produced by the runtime when a deadline wins the race.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The operation's own logic failed.
    #[error("operation failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The operation observed its cancellation token and stopped.
    #[error("operation cancelled")]
    Canceled,

    /// The operation exceeded its deadline.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use tasklane::TaskError;
    ///
    /// let err = TaskError::fail("disk full");
    /// assert_eq!(err.to_string(), "operation failed: disk full");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Timeout { .. } => "task_timeout",
        }
    }
}

/// # Errors produced by the line protocol endpoint.
///
/// Transport errors are surfaced to the immediate caller and never retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NetError {
    /// Nothing is listening at the target address.
    #[error("connection refused by {addr}")]
    ConnectionRefused {
        /// Address that refused the connection.
        addr: SocketAddr,
    },

    /// The peer went away before the exchange completed.
    #[error("connection reset by peer")]
    ConnectionReset,

    /// The request cannot be sent as one line; nothing was written.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected.
        reason: &'static str,
    },

    /// A frame could not be decoded (line too long or not UTF-8).
    #[error("framing error: {0}")]
    Codec(String),

    /// Any other I/O failure.
    #[error(transparent)]
    Io(std::io::Error),
}

impl NetError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            NetError::ConnectionRefused { .. } => "net_connection_refused",
            NetError::ConnectionReset => "net_connection_reset",
            NetError::InvalidRequest { .. } => "net_invalid_request",
            NetError::Codec(_) => "net_codec",
            NetError::Io(_) => "net_io",
        }
    }
}

impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionReset | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => {
                NetError::ConnectionReset
            }
            _ => NetError::Io(err),
        }
    }
}

impl From<tokio_util::codec::LinesCodecError> for NetError {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        use tokio_util::codec::LinesCodecError;
        match err {
            LinesCodecError::Io(io) => NetError::from(io),
            other => NetError::Codec(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
        assert_eq!(
            TaskError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .as_label(),
            "task_timeout"
        );
        assert_eq!(RuntimeError::QueueShutdown.as_label(), "runtime_queue_shutdown");
        assert_eq!(NetError::ConnectionReset.as_label(), "net_connection_reset");
    }

    #[test]
    fn io_reset_maps_to_connection_reset() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        let err: NetError = io.into();
        assert!(matches!(err, NetError::ConnectionReset));

        let other = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(NetError::from(other).as_label(), "net_io");
    }
}
