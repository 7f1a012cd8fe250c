//! # Operation lifecycle state.
//!
//! [`OperationState`] is the public view of where an operation is in its life;
//! [`StateCell`] is the shared cell the runner writes and the supervisor reads.
//!
//! ```text
//! Pending ──► Running ──► Completed
//!    │           ├──────► Failed
//!    │           └──────► Cancelled   (explicit cancel, shutdown or deadline)
//!    └──────────────────► Cancelled   (cancelled before start)
//! ```
//!
//! ## Rules
//! - Terminal states never change again; a late write is ignored.
//! - Reads are lock-free and may observe a transition slightly after it happened.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of one supervised operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationState {
    /// Registered, waiting to start (possibly queued for a permit).
    Pending = 0,
    /// Body is executing.
    Running = 1,
    /// Body returned a value.
    Completed = 2,
    /// Body failed (or panicked).
    Failed = 3,
    /// Cancelled before or during execution, including deadline expiry.
    Cancelled = 4,
}

impl OperationState {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Failed | OperationState::Cancelled
        )
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            OperationState::Pending => "pending",
            OperationState::Running => "running",
            OperationState::Completed => "completed",
            OperationState::Failed => "failed",
            OperationState::Cancelled => "cancelled",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => OperationState::Pending,
            1 => OperationState::Running,
            2 => OperationState::Completed,
            3 => OperationState::Failed,
            _ => OperationState::Cancelled,
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Atomic holder of an [`OperationState`] shared between runner and supervisor.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(OperationState::Pending as u8))
    }

    pub(crate) fn get(&self) -> OperationState {
        OperationState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` unless the current state is already terminal.
    ///
    /// Returns `true` if the state changed.
    pub(crate) fn set(&self, next: OperationState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                if OperationState::from_u8(raw).is_terminal() {
                    None
                } else {
                    Some(next as u8)
                }
            })
            .is_ok()
    }
}
