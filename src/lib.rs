//! # tasklane
//!
//! **tasklane** is a small runtime of concurrency-coordination primitives for
//! tokio, plus a line-oriented echo service built on top of them.
//!
//! It provides supervised gathering that never aborts on the first failure,
//! cooperative cancellation reported as its own outcome, a bounded queue with
//! end-of-stream markers, a FIFO concurrency limiter and deadline-bounded
//! execution.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//!     │  OperationSpec  │  │  OperationSpec  │  │  OperationSpec  │
//!     │ (op, deadline,  │  │                 │  │                 │
//!     │  limiter)       │  │                 │  │                 │
//!     └────────┬────────┘  └────────┬────────┘  └────────┬────────┘
//!              ▼                    ▼                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TaskSupervisor<T>                                                │
//! │  - Registry (handle → token, state, join handle)                  │
//! │  - runtime token (parent of every operation token)                │
//! │  - optional global ConcurrencyLimiter (Config::max_concurrent)    │
//! │  - Bus + SubscriberSet (event fan-out)                            │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────┐       ┌──────────┐       ┌──────────┐
//!     │ run_once │       │ run_once │       │ run_once │   one tokio task each
//!     └────┬─────┘       └────┬─────┘       └────┬─────┘
//!          │ limiter permit(s) → DeadlineGuard → Operation::spawn(token)
//!          ▼
//!     Outcome::{Value, Error, Cancelled, Timeout} ─► gather_all (input order)
//! ```
//!
//! ### Lifecycle
//! ```text
//! spawn ─► Pending ─► (permits) ─► Running ─┬─► Completed
//!             │                             ├─► Failed
//!             │                             └─► Cancelled  (cancel, shutdown, deadline)
//!             └─ cancelled before start ──────► Cancelled  (body never runs)
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types                                   |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Spawn, cancel and gather operations; graceful shutdown.   | [`TaskSupervisor`], [`OperationHandle`]     |
//! | **Operations**    | Cancellable units of work and their outcomes.             | [`Operation`], [`OperationFn`], [`Outcome`] |
//! | **Queue**         | Bounded FIFO with backpressure and end markers.           | [`BoundedQueue`], [`Envelope`]              |
//! | **Limiter**       | FIFO permit pool.                                         | [`ConcurrencyLimiter`]                      |
//! | **Deadlines**     | Race an operation against a timer.                        | [`DeadlineGuard`]                           |
//! | **Transport**     | Line protocol server and client.                          | [`net::LineServer`], [`net::LineClient`]    |
//! | **Events**        | Lifecycle events and subscribers.                         | [`Event`], [`Subscribe`]                    |
//! | **Errors**        | Typed errors for usage, operations and transport.         | [`RuntimeError`], [`TaskError`], [`NetError`] |
//!
//! ## Optional features
//! - `logging` (default): exports the tracing-backed [`LogWriter`] subscriber and [`init_tracing`].
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use tasklane::{Config, ConcurrencyLimiter, OperationFn, OperationRef, OperationSpec, TaskError, TaskSupervisor, sleep_or_cancel};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = TaskSupervisor::new(Config::default())?;
//!     let limiter = ConcurrencyLimiter::new(2)?;
//!
//!     let handles: Vec<_> = (0..4u32)
//!         .map(|i| {
//!             let op: OperationRef<u32> = OperationFn::arc(format!("job-{i}"), move |ctx: CancellationToken| async move {
//!                 sleep_or_cancel(&ctx, Duration::from_millis(10)).await?;
//!                 Ok::<u32, TaskError>(i * 10)
//!             });
//!             sup.spawn(OperationSpec::new(op).with_limiter(limiter.clone()))
//!         })
//!         .collect();
//!
//!     let outcomes = sup.gather_all(&handles).await?;
//!     let values: Vec<u32> = outcomes.into_iter().filter_map(|o| o.into_result().ok()).collect();
//!     assert_eq!(values, vec![0, 10, 20, 30]);
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
#[cfg(feature = "logging")]
mod logging;
mod subscribers;
mod sync;
mod tasks;

pub mod net;
pub mod scenarios;

// ---- Public re-exports ----

pub use core::{
    Config, OperationHandle, OperationState, SupervisorBuilder, TaskSupervisor,
    wait_for_shutdown_signal,
};
pub use error::{NetError, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use sync::{BoundedQueue, ConcurrencyLimiter, DeadlineGuard, Envelope, LimiterPermit, TryPutError};
pub use tasks::{
    BoxOpFuture, Operation, OperationFn, OperationRef, OperationSpec, Outcome, sleep_or_cancel,
    until_cancelled,
};

#[cfg(feature = "logging")]
pub use logging::init_tracing;
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
