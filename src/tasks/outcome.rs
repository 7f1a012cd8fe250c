//! # Terminal outcome of one operation.
//!
//! An [`Outcome`] is produced exactly once per operation and never changes afterward.
//! It is a tagged value instead of a `Result` so callers can tell a failure apart
//! from a cancellation or a missed deadline without inspecting error variants.
//!
//! ```text
//! body returns Ok(v)               → Outcome::Value(v)
//! body returns Err(Fail)           → Outcome::Error(err)
//! body returns Err(Canceled)       → Outcome::Cancelled
//! token fired before completion    → Outcome::Cancelled
//! deadline fired before completion → Outcome::Timeout
//! ```

use std::fmt;
use std::time::Duration;

use crate::core::OperationState;
use crate::error::TaskError;

/// Tagged terminal result of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation returned normally.
    Value(T),
    /// The operation's own logic failed.
    Error(TaskError),
    /// Cooperative cancellation completed (or the operation never started).
    Cancelled,
    /// A deadline won the race; the operation was cancelled.
    Timeout {
        /// Deadline that expired.
        timeout: Duration,
    },
}

impl<T> Outcome<T> {
    /// Maps a body result onto an outcome.
    ///
    /// `Err(Canceled)` and `Err(Timeout)` keep their own tags; every other error is
    /// captured as [`Outcome::Error`].
    pub fn from_result(res: Result<T, TaskError>) -> Self {
        match res {
            Ok(v) => Outcome::Value(v),
            Err(TaskError::Canceled) => Outcome::Cancelled,
            Err(TaskError::Timeout { timeout }) => Outcome::Timeout { timeout },
            Err(e) => Outcome::Error(e),
        }
    }

    /// Returns a short stable label: `value`, `error`, `cancelled` or `timeout`.
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Value(_) => "value",
            Outcome::Error(_) => "error",
            Outcome::Cancelled => "cancelled",
            Outcome::Timeout { .. } => "timeout",
        }
    }

    /// Terminal [`OperationState`] matching this outcome.
    ///
    /// Timeouts are realized through cancellation, so they map to `Cancelled`.
    pub fn state(&self) -> OperationState {
        match self {
            Outcome::Value(_) => OperationState::Completed,
            Outcome::Error(_) => OperationState::Failed,
            Outcome::Cancelled | Outcome::Timeout { .. } => OperationState::Cancelled,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::Timeout { .. })
    }

    /// Borrows the value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Converts back into a `Result`, folding cancellation and timeout into [`TaskError`].
    pub fn into_result(self) -> Result<T, TaskError> {
        match self {
            Outcome::Value(v) => Ok(v),
            Outcome::Error(e) => Err(e),
            Outcome::Cancelled => Err(TaskError::Canceled),
            Outcome::Timeout { timeout } => Err(TaskError::Timeout { timeout }),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(v) => write!(f, "value: {v}"),
            Outcome::Error(e) => write!(f, "error: {e}"),
            Outcome::Cancelled => f.write_str("cancelled"),
            Outcome::Timeout { timeout } => write!(f, "timeout after {timeout:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_result_keeps_cancellation_distinct_from_failure() {
        assert_eq!(Outcome::from_result(Ok::<_, TaskError>(1)), Outcome::Value(1));
        assert_eq!(
            Outcome::<u8>::from_result(Err(TaskError::Canceled)),
            Outcome::Cancelled
        );
        assert!(Outcome::<u8>::from_result(Err(TaskError::fail("boom"))).is_error());
    }

    #[test]
    fn timeout_maps_to_cancelled_state() {
        let out: Outcome<()> = Outcome::Timeout {
            timeout: Duration::from_millis(5),
        };
        assert_eq!(out.state(), OperationState::Cancelled);
        assert_eq!(out.as_label(), "timeout");
    }

    #[test]
    fn display_is_labelled() {
        assert_eq!(Outcome::Value("ok").to_string(), "value: ok");
        assert_eq!(Outcome::<&str>::Cancelled.to_string(), "cancelled");
    }
}
