//! The [`Subscribe`] extension point.
//!
//! A subscriber sees every event the supervisor's listener forwards, on its own
//! worker task and behind its own bounded queue (see [`SubscriberSet`](crate::SubscriberSet)).
//! A subscriber that is slow or panics only loses its own events.
//!
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use async_trait::async_trait;
//! use tasklane::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct TimeoutCounter(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for TimeoutCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::TimeoutHit {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "timeout-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receives runtime events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Calls are sequential and in publish order.
    ///
    /// Runs on the subscriber's worker, so blocking here only backs up this
    /// subscriber's queue.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue length before events for this subscriber are dropped (min 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
