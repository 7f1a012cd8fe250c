//! # Batch runs over a [`TaskSupervisor`].
//!
//! Small, self-contained compositions of the runtime primitives:
//! - [`fetch_all`]: concurrent fetches gathered in submission order
//! - [`limited`]: many sleepers behind one [`ConcurrencyLimiter`]
//! - [`cancel_one`]: three long jobs, one cancelled mid-flight
//! - [`deadlines`]: jobs run one by one under a [`DeadlineGuard`]
//! - [`risky`]: jobs that may fail, each failure kept in its own outcome
//!
//! Durations are expressed in a caller-chosen `unit` so tests can run them on
//! paused time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::{Config, TaskSupervisor};
use crate::error::{RuntimeError, TaskError};
use crate::sync::{ConcurrencyLimiter, DeadlineGuard};
use crate::tasks::{OperationFn, OperationRef, OperationSpec, Outcome, sleep_or_cancel};

/// Operation that sleeps `dur` (cancellably) and then yields `value`.
pub fn sleeper<T>(name: impl Into<String>, dur: Duration, value: T) -> OperationRef<T>
where
    T: Clone + Send + Sync + 'static,
{
    OperationFn::arc(name.into(), move |ctx: CancellationToken| {
        let value = value.clone();
        async move {
            sleep_or_cancel(&ctx, dur).await?;
            Ok::<T, TaskError>(value)
        }
    })
}

/// Runs `(name, delay)` fetches concurrently; results come back in input order.
pub async fn fetch_all(jobs: &[(&str, Duration)]) -> Result<Vec<Outcome<String>>, RuntimeError> {
    let sup = TaskSupervisor::new(Config::default())?;
    let handles: Vec<_> = jobs
        .iter()
        .map(|(name, delay)| sup.spawn_op(sleeper(*name, *delay, format!("{name} data"))))
        .collect();
    sup.gather_all(&handles).await
}

/// Result of [`limited`].
#[derive(Debug)]
pub struct LimitedReport {
    /// One outcome per operation, in submission order (value = operation index).
    pub outcomes: Vec<Outcome<usize>>,
    /// Highest number of bodies observed running at once.
    pub peak: usize,
    /// Wall-clock time of the whole batch.
    pub elapsed: Duration,
}

/// Runs `n` operations that each sleep one `unit`, at most `max` at a time.
pub async fn limited(n: usize, max: usize, unit: Duration) -> Result<LimitedReport, RuntimeError> {
    let limiter = ConcurrencyLimiter::new(max)?;
    let sup = TaskSupervisor::new(Config::default())?;
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let started = Instant::now();
    let handles: Vec<_> = (0..n)
        .map(|idx| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let op: OperationRef<usize> =
                OperationFn::arc(format!("job-{idx}"), move |ctx: CancellationToken| {
                    let active = Arc::clone(&active);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        let res = sleep_or_cancel(&ctx, unit).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        res?;
                        Ok::<usize, TaskError>(idx)
                    }
                });
            sup.spawn(OperationSpec::new(op).with_limiter(limiter.clone()))
        })
        .collect();

    let outcomes = sup.gather_all(&handles).await?;
    let elapsed = started.elapsed();
    info!(n, max, peak = peak.load(Ordering::SeqCst), ?elapsed, "limited batch done");
    Ok(LimitedReport {
        outcomes,
        peak: peak.load(Ordering::SeqCst),
        elapsed,
    })
}

/// Three jobs A (5 units), B (3) and C (4); A is cancelled after 2 units.
///
/// Returns `[Cancelled, Value("B"), Value("C")]`.
pub async fn cancel_one(unit: Duration) -> Result<Vec<Outcome<&'static str>>, RuntimeError> {
    let sup = TaskSupervisor::new(Config::default())?;
    let a = sup.spawn_op(sleeper("A", unit * 5, "A"));
    let b = sup.spawn_op(sleeper("B", unit * 3, "B"));
    let c = sup.spawn_op(sleeper("C", unit * 4, "C"));

    tokio::time::sleep(unit * 2).await;
    info!("cancelling A");
    sup.cancel(&a)?;

    sup.gather_all(&[a, b, c]).await
}

/// Runs one sleeper per duration, sequentially, each under `limit`.
///
/// The value of a finished job is its own duration.
pub async fn deadlines(durations: &[Duration], limit: Duration) -> Vec<Outcome<Duration>> {
    let guard = DeadlineGuard::new(limit);
    let mut out = Vec::with_capacity(durations.len());
    for (idx, dur) in durations.iter().enumerate() {
        let op = sleeper(format!("slow-{idx}"), *dur, *dur);
        let res = guard.run(&op).await;
        info!(job = idx, ?dur, outcome = res.as_label(), "deadline job settled");
        out.push(res);
    }
    out
}

/// Runs one job per name for one `unit`; `should_fail` decides which ones fail.
///
/// Failures stay in their own outcome; siblings are unaffected.
pub async fn risky<F>(names: &[&str], unit: Duration, should_fail: F) -> Result<Vec<Outcome<String>>, RuntimeError>
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    let sup = TaskSupervisor::new(Config::default())?;
    let should_fail = Arc::new(should_fail);
    let handles: Vec<_> = names
        .iter()
        .map(|name| {
            let name = name.to_string();
            let should_fail = Arc::clone(&should_fail);
            let op: OperationRef<String> =
                OperationFn::arc(name.clone(), move |ctx: CancellationToken| {
                    let name = name.clone();
                    let fails = (*should_fail)(&name);
                    async move {
                        sleep_or_cancel(&ctx, unit).await?;
                        if fails {
                            return Err(TaskError::fail(format!("operation {name} failed")));
                        }
                        Ok::<String, TaskError>(format!("operation {name} succeeded"))
                    }
                });
            sup.spawn_op(op)
        })
        .collect();
    sup.gather_all(&handles).await
}

/// Failure predicate that fails each job with probability `p`.
pub fn coin_flip(p: f64) -> impl Fn(&str) -> bool + Send + Sync + 'static {
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    move |_name| rand::rng().random_bool(p)
}
