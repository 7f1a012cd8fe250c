//! # LogWriter: events as tracing records
//!
//! A minimal subscriber that turns incoming [`Event`]s into `tracing` records
//! under the `tasklane::events` target.
//!
//! ## Example output (fmt layer)
//! ```text
//! DEBUG tasklane::events: spawned op="fetch" id=3
//!  INFO tasklane::events: completed op="fetch" id=3
//!  WARN tasklane::events: failed op="parse" id=4 reason="bad header"
//!  WARN tasklane::events: timeout op="slow" id=5 timeout_ms=3000
//!  INFO tasklane::events: cancelled op="a" id=0
//!  WARN tasklane::events: grace exceeded stuck="stubborn"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let op = e.task.as_deref().unwrap_or("-");
        let id = e.op_id.unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::OperationSpawned => debug!(target: "tasklane::events", op, id, "spawned"),
            EventKind::OperationStarting => debug!(target: "tasklane::events", op, id, "starting"),
            EventKind::OperationCompleted => info!(target: "tasklane::events", op, id, "completed"),
            EventKind::OperationFailed => {
                warn!(target: "tasklane::events", op, id, reason, "failed")
            }
            EventKind::OperationCancelled => info!(target: "tasklane::events", op, id, "cancelled"),
            EventKind::TimeoutHit => {
                warn!(target: "tasklane::events", op, id, timeout_ms = e.timeout_ms, "timeout")
            }
            EventKind::CancelRequested => {
                debug!(target: "tasklane::events", op, id, "cancel requested")
            }
            EventKind::ShutdownRequested => info!(target: "tasklane::events", "shutdown requested"),
            EventKind::AllStoppedWithin => {
                info!(target: "tasklane::events", "all operations stopped within grace")
            }
            EventKind::GraceExceeded => {
                warn!(target: "tasklane::events", stuck = reason, "grace exceeded")
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "tasklane::events", subscriber = op, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "tasklane::events", subscriber = op, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
