//! # Example: limited_batch
//!
//! Ten one-second jobs behind a limiter of three: they run in four waves.
//! A second round runs the same batch under `run_until_signal`; press Ctrl-C
//! during it and the jobs still queued or running come back `Cancelled`.
//!
//! ## Run
//! ```bash
//! cargo run --example limited_batch
//! ```

use std::time::Duration;

use tasklane::scenarios::batch;
use tasklane::{ConcurrencyLimiter, Config, OperationSpec, TaskSupervisor, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let report = batch::limited(10, 3, Duration::from_secs(1)).await?;
    let done = report.outcomes.iter().filter(|o| o.is_value()).count();
    println!(
        "completed {done}/{} jobs, peak concurrency {}, elapsed {:.1?}",
        report.outcomes.len(),
        report.peak,
        report.elapsed
    );

    println!("second round: Ctrl-C to stop early");
    let sup: TaskSupervisor<usize> = TaskSupervisor::new(Config::default())?;
    let limiter = ConcurrencyLimiter::new(3)?;
    let specs = (0..10)
        .map(|i| {
            OperationSpec::new(batch::sleeper(format!("job-{i}"), Duration::from_secs(1), i))
                .with_limiter(limiter.clone())
        })
        .collect();
    let outcomes = sup.run_until_signal(specs).await?;
    for (i, outcome) in outcomes.iter().enumerate() {
        println!("[job-{i}] {outcome}");
    }
    Ok(())
}
