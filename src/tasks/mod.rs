//! # Operation abstractions and specifications.
//!
//! This module provides the core operation-related types:
//! - [`Operation`] - trait for implementing async cancelable operations
//! - [`OperationFn`] - function-backed operation implementation
//! - [`OperationRef`] - shared reference to an operation (`Arc<dyn Operation>`)
//! - [`OperationSpec`] - specification bundling an operation with deadline and limiter
//! - [`Outcome`] - tagged terminal result of one operation
//! - [`sleep_or_cancel`], [`until_cancelled`] - token-aware suspension points for bodies

mod cancel;
mod outcome;
mod spec;
mod task;
mod task_fn;

pub use cancel::{sleep_or_cancel, until_cancelled};
pub use outcome::Outcome;
pub use spec::OperationSpec;
pub use task::{BoxOpFuture, Operation, OperationRef};
pub use task_fn::OperationFn;
