//! # Function-backed operation (`OperationFn`)
//!
//! [`OperationFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a fresh
//! future per start. This avoids shared mutable state and needs no `Mutex`.
//!
//! ## Concurrency semantics
//! - Each call to [`Operation::spawn`] creates a **new** future that owns its state.
//! - If operations need shared state, capture an `Arc<...>` explicitly in the closure.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use tasklane::{Operation, OperationFn, OperationRef, TaskError};
//!
//! let op: OperationRef<String> = OperationFn::arc("fetch", |ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     Ok::<_, TaskError>("payload".to_string())
//! });
//!
//! assert_eq!(op.name(), "fetch");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::task::{BoxOpFuture, Operation};

/// Function-backed operation implementation.
///
/// Wraps a closure that *creates* a new future per start.
#[derive(Debug)]
pub struct OperationFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> OperationFn<F> {
    /// Creates a new function-backed operation.
    ///
    /// Prefer [`OperationFn::arc`] when you immediately need an
    /// [`OperationRef`](crate::OperationRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut, T> Operation for OperationFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, ctx: CancellationToken) -> BoxOpFuture<T> {
        let fut = (self.f)(ctx);
        Box::pin(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::OperationRef;

    #[tokio::test]
    async fn each_spawn_creates_fresh_future() {
        let op: OperationRef<u32> = OperationFn::arc("count", |_ctx: CancellationToken| async {
            Ok::<u32, TaskError>(7)
        });

        let a = op.spawn(CancellationToken::new()).await;
        let b = op.spawn(CancellationToken::new()).await;
        assert_eq!(a, Ok(7));
        assert_eq!(b, Ok(7));
    }

    #[tokio::test]
    async fn body_sees_cancelled_token() {
        let op: OperationRef<()> = OperationFn::arc("watch", |ctx: CancellationToken| async move {
            if ctx.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            Ok(())
        });

        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(op.spawn(token).await, Err(TaskError::Canceled));
    }
}
