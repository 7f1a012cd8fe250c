//! # Operation abstraction.
//!
//! This module defines the [`Operation`] trait: an asynchronous, cancelable unit of work
//! that produces one value. The common handle type is [`OperationRef`], an
//! `Arc<dyn Operation<Output = T>>` suitable for sharing across the runtime.
//!
//! An operation receives a [`CancellationToken`] on every start and should watch it at
//! its own suspension points, returning `Err(TaskError::Canceled)` once it fires.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Boxed future returned by [`Operation::spawn`].
pub type BoxOpFuture<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send + 'static>>;

/// Shared handle to an operation producing `T`.
pub type OperationRef<T> = Arc<dyn Operation<Output = T>>;

/// # Asynchronous, cancelable unit of work.
///
/// An `Operation` has a stable [`name`](Operation::name) and starts on demand through
/// [`spawn`](Operation::spawn), which must return a **fresh** future each call.
///
/// The runtime guarantees that:
/// - `spawn` is never called for an operation cancelled before it started;
/// - the token passed to `spawn` fires on explicit cancel, deadline expiry and shutdown.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use tasklane::{BoxOpFuture, Operation, TaskError};
///
/// struct Answer;
///
/// impl Operation for Answer {
///     type Output = u32;
///
///     fn name(&self) -> &str { "answer" }
///
///     fn spawn(&self, ctx: CancellationToken) -> BoxOpFuture<u32> {
///         Box::pin(async move {
///             if ctx.is_cancelled() {
///                 return Err(TaskError::Canceled);
///             }
///             Ok(42)
///         })
///     }
/// }
/// ```
pub trait Operation: Send + Sync + 'static {
    /// Value produced on success.
    type Output: Send + 'static;

    /// Returns a stable, human-readable operation name.
    fn name(&self) -> &str;

    /// Creates the future for one run of this operation.
    fn spawn(&self, ctx: CancellationToken) -> BoxOpFuture<Self::Output>;
}

impl<O: Operation + ?Sized> Operation for Arc<O> {
    type Output = O::Output;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn spawn(&self, ctx: CancellationToken) -> BoxOpFuture<Self::Output> {
        (**self).spawn(ctx)
    }
}
