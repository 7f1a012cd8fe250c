//! Helpers for writing operation bodies that honor their cancellation token.
//!
//! Every `await` in an operation body is a potential suspension point, but only the
//! ones raced against the token let the body notice a cancel request. These helpers
//! do the racing and return `Err(TaskError::Canceled)` so `?` propagates it upward.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Sleeps for `dur` unless `ctx` is cancelled first.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use tasklane::{TaskError, sleep_or_cancel};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = CancellationToken::new();
/// ctx.cancel();
/// assert_eq!(sleep_or_cancel(&ctx, Duration::from_secs(60)).await, Err(TaskError::Canceled));
/// # }
/// ```
pub async fn sleep_or_cancel(ctx: &CancellationToken, dur: Duration) -> Result<(), TaskError> {
    until_cancelled(ctx, tokio::time::sleep(dur)).await
}

/// Awaits `fut` unless `ctx` is cancelled first.
///
/// Cancellation is checked first, so an already cancelled token never polls `fut`.
pub async fn until_cancelled<F>(ctx: &CancellationToken, fut: F) -> Result<F::Output, TaskError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(TaskError::Canceled),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancel() {
        let ctx = CancellationToken::new();
        assert_eq!(sleep_or_cancel(&ctx, Duration::from_secs(1)).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let ctx = CancellationToken::new();
        let trigger = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let started = tokio::time::Instant::now();
        assert_eq!(
            sleep_or_cancel(&ctx, Duration::from_secs(60)).await,
            Err(TaskError::Canceled)
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
