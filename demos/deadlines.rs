//! # Example: deadlines
//!
//! Jobs of 1s, 5s and 2s, each run under a 3s deadline, then a batch of
//! jobs that fail at random without disturbing each other.
//!
//! ## Run
//! ```bash
//! cargo run --example deadlines
//! ```

use std::time::Duration;

use tasklane::init_tracing;
use tasklane::scenarios::batch;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let secs = Duration::from_secs;
    let outcomes = batch::deadlines(&[secs(1), secs(5), secs(2)], secs(3)).await;
    for (idx, outcome) in outcomes.iter().enumerate() {
        println!("[slow-{idx}] {outcome:?}");
    }

    let risky = batch::risky(&["A", "B", "C"], Duration::from_millis(500), batch::coin_flip(0.5)).await?;
    for outcome in &risky {
        match outcome.clone().into_result() {
            Ok(msg) => println!("{msg}"),
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}
