//! # Drive one supervised operation to its terminal outcome.
//!
//! [`run_once`] is the body of the tokio task spawned per operation. It gates the
//! start on the operation's token and limiters, runs the body under its deadline,
//! and reports the result.
//!
//! ## Event flow
//!
//! ```text
//! token already cancelled ─────────────────────► OperationCancelled
//! wait spec limiter ─┬─ token fired ───────────► OperationCancelled
//! wait global limit ─┘
//! state = Running, OperationStarting
//! run_guarded(op, token, deadline)
//!   ├─ Value      ─► OperationCompleted
//!   ├─ Error      ─► OperationFailed   (panics land here too)
//!   ├─ Cancelled  ─► OperationCancelled
//!   └─ Timeout    ─► TimeoutHit
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event, after the terminal state is set.
//! - Permits are taken before the deadline starts and released before the terminal
//!   event is published.
//! - A panic in the body is caught and reported as `Outcome::Error`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::alive::{OperationState, StateCell};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;
use crate::sync::{ConcurrencyLimiter, LimiterPermit, run_guarded};
use crate::tasks::{OperationSpec, Outcome};

/// Everything a runner needs besides the spec.
pub(crate) struct RunContext {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    pub(crate) token: CancellationToken,
    pub(crate) state: Arc<StateCell>,
    pub(crate) global: Option<ConcurrencyLimiter>,
    pub(crate) bus: Bus,
    pub(crate) settled: Arc<Notify>,
}

/// Runs `spec` to completion and returns its outcome.
pub(crate) async fn run_once<T: Send + 'static>(spec: OperationSpec<T>, cx: RunContext) -> Outcome<T> {
    let out = AssertUnwindSafe(execute(&spec, &cx))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            Outcome::Error(TaskError::fail(format!(
                "panicked: {}",
                panic_message(payload.as_ref())
            )))
        });
    finish(&cx, &out);
    out
}

async fn execute<T: Send + 'static>(spec: &OperationSpec<T>, cx: &RunContext) -> Outcome<T> {
    if cx.token.is_cancelled() {
        return Outcome::Cancelled;
    }
    let _spec_permit = match admit(spec.limiter(), &cx.token).await {
        Ok(p) => p,
        Err(out) => return out,
    };
    let _global_permit = match admit(cx.global.as_ref(), &cx.token).await {
        Ok(p) => p,
        Err(out) => return out,
    };

    cx.state.set(OperationState::Running);
    cx.bus.publish(
        Event::new(EventKind::OperationStarting)
            .with_task(Arc::clone(&cx.name))
            .with_op_id(cx.id),
    );
    run_guarded(spec.op().as_ref(), &cx.token, spec.timeout()).await
}

/// Waits for a permit from `limiter`, if any.
async fn admit<T>(
    limiter: Option<&ConcurrencyLimiter>,
    token: &CancellationToken,
) -> Result<Option<LimiterPermit>, Outcome<T>> {
    let Some(limiter) = limiter else {
        return Ok(None);
    };
    match limiter.acquire_or_cancel(token).await {
        Some(permit) => Ok(Some(permit)),
        None if token.is_cancelled() => Err(Outcome::Cancelled),
        None => Err(Outcome::Error(TaskError::fail("concurrency limiter closed"))),
    }
}

/// Records the terminal state and publishes the one terminal event.
fn finish<T>(cx: &RunContext, out: &Outcome<T>) {
    cx.state.set(out.state());
    debug!(op = %cx.name, id = cx.id, outcome = out.as_label(), "operation settled");

    let ev = match out {
        Outcome::Value(_) => Event::new(EventKind::OperationCompleted),
        Outcome::Error(e) => Event::new(EventKind::OperationFailed).with_reason(e.to_string()),
        Outcome::Cancelled => Event::new(EventKind::OperationCancelled),
        Outcome::Timeout { timeout } => Event::new(EventKind::TimeoutHit).with_timeout(*timeout),
    };
    cx.bus
        .publish(ev.with_task(Arc::clone(&cx.name)).with_op_id(cx.id));
    cx.settled.notify_waiters();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{OperationFn, OperationRef, sleep_or_cancel};
    use std::time::Duration;

    fn context(bus: &Bus, token: CancellationToken) -> RunContext {
        RunContext {
            id: 1,
            name: Arc::from("op"),
            token,
            state: Arc::new(StateCell::new()),
            global: None,
            bus: bus.clone(),
            settled: Arc::new(Notify::new()),
        }
    }

    fn terminal_kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind.is_terminal() {
                kinds.push(ev.kind);
            }
        }
        kinds
    }

    #[tokio::test]
    async fn panic_becomes_error_with_one_failed_event() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let op: OperationRef<()> = OperationFn::arc("op", |_ctx: CancellationToken| async {
            if true {
                panic!("bad state");
            }
            Ok::<(), TaskError>(())
        });
        let cx = context(&bus, CancellationToken::new());
        let state = Arc::clone(&cx.state);

        let out = run_once(OperationSpec::new(op), cx).await;
        assert_eq!(out, Outcome::Error(TaskError::fail("panicked: bad state")));
        assert_eq!(state.get(), OperationState::Failed);
        assert_eq!(terminal_kinds(&mut rx), vec![EventKind::OperationFailed]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_while_queued_never_runs() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let held = limiter.acquire().await.unwrap();

        let op: OperationRef<()> = OperationFn::arc("op", |ctx: CancellationToken| async move {
            sleep_or_cancel(&ctx, Duration::from_secs(1)).await
        });
        let token = CancellationToken::new();
        let cx = context(&bus, token.clone());
        let state = Arc::clone(&cx.state);
        let run = tokio::spawn(run_once(OperationSpec::new(op).with_limiter(limiter.clone()), cx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.get(), OperationState::Pending);
        token.cancel();

        assert_eq!(run.await.unwrap(), Outcome::Cancelled);
        assert_eq!(state.get(), OperationState::Cancelled);
        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::OperationCancelled]);
        drop(held);
        assert_eq!(limiter.acquired(), limiter.released());
    }
}
