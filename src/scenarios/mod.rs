//! Ready-made compositions of the runtime primitives.
//!
//! - [`pipeline`]: producers and consumers over a bounded queue with end markers
//! - [`batch`]: gather, limiter, cancellation, deadline and failure-isolation runs
//!
//! The demos under `demos/` are thin wrappers around these functions.

pub mod batch;
pub mod pipeline;

pub use pipeline::{PipelineConfig, PipelineReport};
