//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! a built-in [`LogWriter`] for handling runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Runner ── publish(Event) ──► Bus ──► supervisor listener ──► SubscriberSet::emit
//!                                                                  │
//!                                                     ┌────────────┼───────────┐
//!                                                     ▼            ▼           ▼
//!                                                 LogWriter     Metrics     Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
