//! # ConcurrencyLimiter: FIFO permit pool.
//!
//! Bounds how many operation bodies run at once. Built on [`tokio::sync::Semaphore`],
//! whose waiters are served strictly in arrival order, so no acquirer is starved by
//! later arrivals.
//!
//! ## Rules
//! - `held <= max` at all times.
//! - A permit is released on **every** exit path (return, error, panic unwind,
//!   cancellation by drop) because release lives in [`LimiterPermit`]'s `Drop`.
//! - `released` is bumped before the semaphore permit is returned, so a waiter woken
//!   by the release always observes `acquired - released <= max`.
//!
//! ```text
//! with_permit(body)
//!   ├─► acquire (FIFO, suspension point)
//!   ├─► body.await
//!   └─► drop(permit) ─► released += 1 ─► semaphore.add_permits(1)
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;

struct Inner {
    sem: Arc<Semaphore>,
    max: usize,
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Counting permit pool bounding simultaneous execution.
///
/// Cheap to clone; clones share one pool.
///
/// # Example
/// ```
/// use tasklane::ConcurrencyLimiter;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = ConcurrencyLimiter::new(3).unwrap();
/// let out = limiter.with_permit(async { 2 + 2 }).await.unwrap();
/// assert_eq!(out, 4);
/// assert_eq!(limiter.available(), 3);
/// # }
/// ```
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyLimiter")
            .field("max", &self.inner.max)
            .field("available", &self.available())
            .finish()
    }
}

/// A held permit; released when dropped.
pub struct LimiterPermit {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        self.inner.released.fetch_add(1, Ordering::AcqRel);
    }
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `max` permits.
    ///
    /// `max == 0` would block every caller forever and is rejected with
    /// [`RuntimeError::InvalidConfiguration`].
    pub fn new(max: usize) -> Result<Self, RuntimeError> {
        if max == 0 {
            return Err(RuntimeError::invalid("limiter max must be at least 1"));
        }
        if max > Semaphore::MAX_PERMITS {
            return Err(RuntimeError::invalid(format!(
                "limiter max must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                sem: Arc::new(Semaphore::new(max)),
                max,
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
        })
    }

    /// Waits for a permit (FIFO by arrival).
    ///
    /// Fails with [`RuntimeError::LimiterClosed`] once [`close`](Self::close) was called.
    pub async fn acquire(&self) -> Result<LimiterPermit, RuntimeError> {
        let permit = self
            .inner
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_closed| RuntimeError::LimiterClosed)?;
        self.inner.acquired.fetch_add(1, Ordering::AcqRel);
        Ok(LimiterPermit {
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Waits for a permit unless `token` fires first.
    ///
    /// Returns `None` on cancellation or when the limiter is closed. A cancelled
    /// waiter leaves the queue without consuming a permit.
    pub async fn acquire_or_cancel(&self, token: &CancellationToken) -> Option<LimiterPermit> {
        tokio::select! {
            res = self.acquire() => res.ok(),
            _ = token.cancelled() => None,
        }
    }

    /// Runs `body` while holding one permit.
    ///
    /// `body` is not polled until the permit is granted. The permit is released
    /// when `body` finishes or when the returned future is dropped.
    pub async fn with_permit<F>(&self, body: F) -> Result<F::Output, RuntimeError>
    where
        F: Future,
    {
        let _permit = self.acquire().await?;
        Ok(body.await)
    }

    /// Closes the pool: current and future waiters fail, held permits stay valid.
    pub fn close(&self) {
        self.inner.sem.close();
    }

    /// Maximum number of simultaneous holders.
    pub fn max(&self) -> usize {
        self.inner.max
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.inner.sem.available_permits()
    }

    /// Permits currently held.
    pub fn in_use(&self) -> usize {
        let acquired = self.inner.acquired.load(Ordering::Acquire);
        let released = self.inner.released.load(Ordering::Acquire);
        acquired.saturating_sub(released) as usize
    }

    /// Lifetime count of granted permits.
    pub fn acquired(&self) -> u64 {
        self.inner.acquired.load(Ordering::Acquire)
    }

    /// Lifetime count of released permits.
    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::Acquire)
    }
}
