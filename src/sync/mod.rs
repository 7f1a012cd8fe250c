//! Coordination primitives shared between concurrent operations.
//!
//! - [`BoundedQueue`] fixed-capacity FIFO with blocking `put`/`get` and end-of-stream markers
//! - [`ConcurrencyLimiter`] FIFO permit pool bounding simultaneous bodies
//! - [`DeadlineGuard`] races one operation against a timer
//!
//! The queue and the limiter are the only structures mutated by several operations
//! at once; their internal counters change under mutual exclusion while the guarded
//! bodies run unlocked.

mod deadline;
mod limiter;
mod queue;

pub use deadline::DeadlineGuard;
pub(crate) use deadline::run_guarded;
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use queue::{BoundedQueue, Envelope, TryPutError};
