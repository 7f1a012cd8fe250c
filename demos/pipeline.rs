//! # Example: pipeline
//!
//! Three producers put ten items each into a queue of capacity five; three
//! consumers drain it until each sees its end marker.
//!
//! ## Flow
//! ```text
//! producers ──► BoundedQueue(5) ──► consumers
//!     │                               ▲
//!     └─ gather ─► send_end_markers(3)┘─► gather ─► report
//! ```
//!
//! ## Run
//! ```bash
//! TASKLANE_LOG=debug cargo run --example pipeline
//! ```

use tasklane::init_tracing;
use tasklane::scenarios::{PipelineConfig, pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let report = pipeline::run(PipelineConfig::default()).await?;

    println!("produced per producer: {:?}", report.produced);
    println!("consumed per consumer: {:?}", report.consumed);
    println!(
        "total: produced={} consumed={} incomplete={}",
        report.total_produced(),
        report.total_consumed(),
        report.incomplete
    );
    Ok(())
}
