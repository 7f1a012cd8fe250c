//! # Example: task_cancel
//!
//! Three jobs (5s, 3s, 4s); the first one is cancelled after 2s. Gathering
//! reports the cancellation as an outcome while the other two finish.
//!
//! ## Run
//! ```bash
//! cargo run --example task_cancel
//! ```

use std::time::Duration;

use tasklane::init_tracing;
use tasklane::scenarios::batch;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let outcomes = batch::cancel_one(Duration::from_secs(1)).await?;
    for (name, outcome) in ["A", "B", "C"].iter().zip(&outcomes) {
        println!("[{name}] {outcome}");
    }
    Ok(())
}
