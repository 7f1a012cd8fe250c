//! # Runtime events emitted by the supervisor and its operation runners.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: operation flow (spawned, starting, completed, failed, cancelled, timeout)
//! - **Control events**: cancel requests and supervisor shutdown
//! - **Subscriber events**: overflow and panic reports from subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, operation
//! name and id, reasons, and deadlines.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tasklane::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::OperationFailed)
//!     .with_task("fetch-users")
//!     .with_op_id(3)
//!     .with_reason("boom")
//!     .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::OperationFailed);
//! assert_eq!(ev.task.as_deref(), Some("fetch-users"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed or `shutdown()` called).
    ShutdownRequested,

    /// All operations stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some operations did not stop in time.
    ///
    /// Sets:
    /// - `reason`: comma-separated names of stuck operations
    GraceExceeded,

    // === Operation lifecycle events ===
    /// Operation was registered with the supervisor (state `Pending`).
    ///
    /// Sets:
    /// - `task`: operation name
    /// - `op_id`: handle id
    OperationSpawned,

    /// Operation body is about to start (permit held, state `Running`).
    ///
    /// Sets:
    /// - `task`, `op_id`
    OperationStarting,

    /// Operation returned a value. Terminal.
    ///
    /// Sets:
    /// - `task`, `op_id`
    OperationCompleted,

    /// Operation's own logic failed. Terminal.
    ///
    /// Sets:
    /// - `task`, `op_id`
    /// - `reason`: failure message
    OperationFailed,

    /// Operation acknowledged cancellation or was cancelled before it started. Terminal.
    ///
    /// Sets:
    /// - `task`, `op_id`
    OperationCancelled,

    /// Operation exceeded its deadline and was cancelled. Terminal.
    ///
    /// Sets:
    /// - `task`, `op_id`
    /// - `timeout_ms`: configured deadline (ms)
    TimeoutHit,

    // === Control events ===
    /// Explicit cancel request for one operation.
    ///
    /// Sets:
    /// - `task`, `op_id`
    CancelRequested,
}

impl EventKind {
    /// True for the four kinds that carry an operation's single terminal report.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::OperationCompleted
                | EventKind::OperationFailed
                | EventKind::OperationCancelled
                | EventKind::TimeoutHit
        )
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the operation (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Supervisor handle id, if applicable.
    pub op_id: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            op_id: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an operation name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a supervisor handle id.
    #[inline]
    pub fn with_op_id(mut self, id: u64) -> Self {
        self.op_id = Some(id);
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}
