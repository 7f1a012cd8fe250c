//! # DeadlineGuard: race an operation against a timer.
//!
//! ```text
//! with_timeout(op, d)
//!   ├─ d == 0 ──────────────► cancel token, Timeout (op never started)
//!   └─ start op ─► select! { biased;
//!                    op finished      → its Outcome        (wins ties)
//!                    token cancelled  → wait for ack, Cancelled
//!                    timer fired      → cancel token, detach op, Timeout
//!                  }
//! ```
//!
//! ## Rules
//! - Completion takes precedence: the operation is polled before the timer, so an
//!   operation that finishes in the same tick never reports `Timeout`.
//! - On timeout the caller gets `Timeout` immediately. The in-flight future keeps
//!   running in a detached task until it observes its (now cancelled) token; its
//!   result is discarded.
//! - Timeouts use the same [`CancellationToken`] as explicit cancellation.

use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::RuntimeError;
use crate::tasks::{BoxOpFuture, Operation, Outcome};

/// Wraps one operation with a deadline.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use tasklane::{DeadlineGuard, OperationFn, OperationRef, Outcome, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let quick: OperationRef<&'static str> = OperationFn::arc("quick", |_ctx: CancellationToken| async {
///     Ok::<_, TaskError>("done")
/// });
///
/// let out = DeadlineGuard::new(Duration::from_secs(1)).run(&quick).await;
/// assert_eq!(out, Outcome::Value("done"));
///
/// let out = DeadlineGuard::with_timeout(&quick, Duration::ZERO).await;
/// assert!(out.is_timeout());
/// # }
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlineGuard {
    timeout: Duration,
}

impl DeadlineGuard {
    /// Creates a guard with the given deadline.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Creates a guard from fractional seconds.
    ///
    /// Negative, NaN or overflowing values are rejected with
    /// [`RuntimeError::InvalidConfiguration`].
    pub fn from_secs_f64(secs: f64) -> Result<Self, RuntimeError> {
        Duration::try_from_secs_f64(secs)
            .map(Self::new)
            .map_err(|e| RuntimeError::invalid(format!("deadline {secs}: {e}")))
    }

    /// Returns the configured deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `op` under this guard's deadline.
    pub async fn run<O>(&self, op: &O) -> Outcome<O::Output>
    where
        O: Operation + ?Sized,
    {
        Self::with_timeout(op, self.timeout).await
    }

    /// Runs `op` with a fresh cancellation token and the given deadline.
    pub async fn with_timeout<O>(op: &O, timeout: Duration) -> Outcome<O::Output>
    where
        O: Operation + ?Sized,
    {
        let token = CancellationToken::new();
        run_guarded(op, &token, Some(timeout)).await
    }
}

/// Starts `op` on `token` and drives it to an [`Outcome`].
///
/// Used by the supervisor so explicit cancellation and the deadline share one token.
/// A token that is already cancelled yields `Cancelled` without starting `op`.
pub(crate) async fn run_guarded<O>(
    op: &O,
    token: &CancellationToken,
    timeout: Option<Duration>,
) -> Outcome<O::Output>
where
    O: Operation + ?Sized,
{
    if let Some(limit) = timeout
        && limit.is_zero()
    {
        token.cancel();
        return Outcome::Timeout { timeout: limit };
    }
    if token.is_cancelled() {
        return Outcome::Cancelled;
    }
    let fut = op.spawn(token.clone());
    drive(op.name(), fut, token, timeout).await
}

/// Races a started operation against its token and optional deadline.
async fn drive<T: Send + 'static>(
    name: &str,
    mut fut: BoxOpFuture<T>,
    token: &CancellationToken,
    timeout: Option<Duration>,
) -> Outcome<T> {
    let limit = timeout.unwrap_or(Duration::MAX);
    let deadline = async move {
        match timeout {
            Some(d) => time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    tokio::select! {
        biased;
        res = &mut fut => {
            if token.is_cancelled() {
                // Cancel was requested before the body returned; whatever it
                // produced afterwards does not count.
                Outcome::Cancelled
            } else {
                Outcome::from_result(res)
            }
        }
        _ = token.cancelled() => {
            let _ack = fut.await;
            Outcome::Cancelled
        }
        _ = &mut deadline => {
            token.cancel();
            debug!(op = name, timeout = ?limit, "deadline hit; acknowledgement continues detached");
            tokio::spawn(async move {
                let _ = fut.await;
            });
            Outcome::Timeout { timeout: limit }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::tasks::{OperationFn, OperationRef, sleep_or_cancel};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn sleeper(d: Duration, flag: Arc<AtomicBool>) -> OperationRef<u32> {
        OperationFn::arc("sleeper", move |ctx: CancellationToken| {
            let flag = Arc::clone(&flag);
            async move {
                sleep_or_cancel(&ctx, d).await?;
                flag.store(true, Ordering::SeqCst);
                Ok::<u32, TaskError>(1)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn zero_deadline_never_starts_op() {
        let finished = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&started);
        let op: OperationRef<()> = OperationFn::arc("watched", move |_ctx: CancellationToken| {
            seen.store(true, Ordering::SeqCst);
            async { Ok::<(), TaskError>(()) }
        });

        let out = DeadlineGuard::with_timeout(&op, Duration::ZERO).await;
        assert!(out.is_timeout());
        assert!(!started.load(Ordering::SeqCst));

        let out = DeadlineGuard::with_timeout(&sleeper(Duration::ZERO, finished.clone()), Duration::ZERO).await;
        assert!(out.is_timeout());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn finishing_in_half_the_deadline_returns_value() {
        let finished = Arc::new(AtomicBool::new(false));
        let op = sleeper(Duration::from_millis(500), finished.clone());
        let out = DeadlineGuard::new(Duration::from_secs(1)).run(&op).await;
        assert_eq!(out, Outcome::Value(1));
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_op_times_out_and_is_cancelled() {
        let finished = Arc::new(AtomicBool::new(false));
        let op = sleeper(Duration::from_secs(5), finished.clone());
        let started = time::Instant::now();
        let out = DeadlineGuard::new(Duration::from_secs(3)).run(&op).await;

        assert_eq!(
            out,
            Outcome::Timeout {
                timeout: Duration::from_secs(3)
            }
        );
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!finished.load(Ordering::SeqCst), "cancelled op must not finish its work");
    }

    #[tokio::test(start_paused = true)]
    async fn completion_wins_a_tie() {
        let finished = Arc::new(AtomicBool::new(false));
        let op = sleeper(Duration::from_secs(2), finished.clone());
        let out = DeadlineGuard::new(Duration::from_secs(2)).run(&op).await;
        assert_eq!(out, Outcome::Value(1));
    }

    #[tokio::test(start_paused = true)]
    async fn errors_pass_through_unchanged() {
        let op: OperationRef<()> = OperationFn::arc("broken", |_ctx: CancellationToken| async {
            Err::<(), _>(TaskError::fail("nope"))
        });
        let out = DeadlineGuard::new(Duration::from_secs(1)).run(&op).await;
        assert_eq!(out, Outcome::Error(TaskError::fail("nope")));
    }

    #[test]
    fn negative_seconds_are_rejected() {
        assert!(DeadlineGuard::from_secs_f64(-1.0).is_err());
        assert!(DeadlineGuard::from_secs_f64(f64::NAN).is_err());
        assert_eq!(
            DeadlineGuard::from_secs_f64(1.5).unwrap().timeout(),
            Duration::from_millis(1500)
        );
    }
}
