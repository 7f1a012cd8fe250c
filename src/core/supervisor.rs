//! # TaskSupervisor: spawn, cancel and gather supervised operations.
//!
//! The [`TaskSupervisor`] owns the event bus, a [`SubscriberSet`], the operation
//! registry and a runtime cancellation token. Every spawned operation runs in its
//! own tokio task with a child of that token, so a single `cancel` reaches one
//! operation while `shutdown` reaches all of them.
//!
//! ## High-level architecture
//! ```text
//! spawn(spec) ──► id, child token, StateCell ──► tokio::spawn(run_once(spec, cx))
//!                                                        │
//!                                 OperationSpawned ◄─────┤ publish
//!                                                        ▼
//!                 limiter(s) ─► OperationStarting ─► run_guarded ─► terminal event
//!
//! cancel(h)       ──► CancelRequested, child token.cancel()
//! gather_all(hs)  ──► take all join handles (validated up front) ─► await in input order
//! run_until(s, f) ──► spawn all ─► gather, or f completes first ─► shutdown ─► gather
//! shutdown()      ──► ShutdownRequested, runtime_token.cancel()
//!                     └─► wait up to cfg.grace:
//!                            ├─ all settled   → AllStoppedWithin
//!                            └─ grace elapsed → GraceExceeded + RuntimeError::GraceExceeded
//!
//! Event flow:
//!   runners / supervisor ── publish ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//! ```
//!
//! ## Rules
//! - `gather_all` never fails because of an operation's own failure, cancellation,
//!   timeout or panic; those are [`Outcome`]s. It fails only for usage errors
//!   (unknown or already gathered handle), and then before awaiting anything.
//! - Output order is input order, not completion order.
//! - Cancellation is cooperative: the body observes its token at its own suspension
//!   points. An operation cancelled before it starts never runs its body.
//! - Dropping a `gather_all` future mid-way detaches the remaining runners; their
//!   handles then count as gathered.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use tasklane::{Config, OperationFn, OperationRef, Outcome, TaskError, TaskSupervisor, sleep_or_cancel};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tasklane::RuntimeError> {
//! let sup = TaskSupervisor::new(Config::default())?;
//!
//! let ok: OperationRef<u32> = OperationFn::arc("ok", |_ctx: CancellationToken| async {
//!     Ok::<u32, TaskError>(1)
//! });
//! let bad: OperationRef<u32> = OperationFn::arc("bad", |_ctx: CancellationToken| async {
//!     Err::<u32, _>(TaskError::fail("boom"))
//! });
//! let slow: OperationRef<u32> = OperationFn::arc("slow", |ctx: CancellationToken| async move {
//!     sleep_or_cancel(&ctx, Duration::from_secs(60)).await?;
//!     Ok::<u32, TaskError>(3)
//! });
//!
//! let handles = [sup.spawn_op(ok), sup.spawn_op(bad), sup.spawn_op(slow)];
//! sup.cancel(&handles[2])?;
//!
//! let outcomes = sup.gather_all(&handles).await?;
//! assert_eq!(outcomes[0], Outcome::Value(1));
//! assert!(outcomes[1].is_error());
//! assert!(outcomes[2].is_cancelled());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::core::alive::{OperationState, StateCell};
use crate::core::builder::SupervisorBuilder;
use crate::core::registry::{Registry, Taken};
use crate::core::runner::{RunContext, run_once};
use crate::core::{Config, shutdown};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::sync::ConcurrencyLimiter;
use crate::tasks::{OperationRef, OperationSpec, Outcome};

/// Distinguishes handles of different supervisors.
static SUPERVISOR_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque reference to an operation spawned on a [`TaskSupervisor`].
///
/// Handles are only meaningful to the supervisor that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OperationHandle {
    owner: u64,
    id: u64,
}

impl OperationHandle {
    /// Supervisor-local operation id (spawn order, starting at 0).
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Coordinates supervised operations, event delivery and graceful shutdown.
///
/// `T` is the value type produced by the operations it runs. Dropping the
/// supervisor cancels every operation still running and stops event delivery.
pub struct TaskSupervisor<T> {
    cfg: Config,
    bus: Bus,
    registry: Registry<T>,
    runtime_token: CancellationToken,
    limiter: Option<ConcurrencyLimiter>,
    owner: u64,
    _listener: DropGuard,
}

impl<T: Send + 'static> TaskSupervisor<T> {
    /// Creates a supervisor without subscribers.
    ///
    /// Fails with [`RuntimeError::InvalidConfiguration`] if `max_concurrent`
    /// exceeds what a limiter can hold.
    pub fn new(cfg: Config) -> Result<Self, RuntimeError> {
        Self::builder(cfg).build()
    }

    /// Starts building a supervisor with subscribers.
    pub fn builder(cfg: Config) -> SupervisorBuilder<T> {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, RuntimeError> {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let limiter = cfg
            .concurrency_limit()
            .map(ConcurrencyLimiter::new)
            .transpose()?;
        let listener_token = CancellationToken::new();
        if !subscribers.is_empty() {
            let subs = SubscriberSet::new(subscribers, bus.clone());
            spawn_listener(&bus, subs, listener_token.clone());
        }

        Ok(Self {
            cfg,
            bus,
            registry: Registry::new(),
            runtime_token: CancellationToken::new(),
            limiter,
            owner: SUPERVISOR_SEQ.fetch_add(1, Ordering::Relaxed),
            _listener: listener_token.drop_guard(),
        })
    }

    /// Returns the configuration this supervisor was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the event bus (subscribe to observe the runtime directly).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Spawns `spec` and returns its handle.
    ///
    /// The operation starts `Pending`; it becomes `Running` once its limiter
    /// permits (if any) are granted.
    pub fn spawn(&self, spec: OperationSpec<T>) -> OperationHandle {
        let id = self.registry.next_id();
        let name: Arc<str> = Arc::from(spec.name());
        let token = self.runtime_token.child_token();
        let state = Arc::new(StateCell::new());

        self.bus.publish(
            Event::new(EventKind::OperationSpawned)
                .with_task(Arc::clone(&name))
                .with_op_id(id),
        );
        let cx = RunContext {
            id,
            name: Arc::clone(&name),
            token: token.clone(),
            state: Arc::clone(&state),
            global: self.limiter.clone(),
            bus: self.bus.clone(),
            settled: self.registry.settled(),
        };
        let join = tokio::spawn(run_once(spec, cx));
        self.registry.insert(id, name, token, state, join);

        OperationHandle {
            owner: self.owner,
            id,
        }
    }

    /// Spawns `op` with the supervisor's default deadline and no extra limiter.
    pub fn spawn_op(&self, op: OperationRef<T>) -> OperationHandle {
        self.spawn(OperationSpec::with_defaults(op, &self.cfg))
    }

    /// Requests cooperative cancellation of one operation.
    ///
    /// Returns `Ok(true)` if the operation was still live, `Ok(false)` if it had
    /// already settled. Cancelling twice is harmless.
    pub fn cancel(&self, handle: &OperationHandle) -> Result<bool, RuntimeError> {
        self.check_owner(handle)?;
        let Some(entry) = self.registry.lookup(handle.id) else {
            // Retired entries are terminal by construction.
            return match self.registry.state(handle.id) {
                Some(_) => Ok(false),
                None => Err(RuntimeError::UnknownHandle { id: handle.id }),
            };
        };
        if entry.state.get().is_terminal() {
            return Ok(false);
        }
        self.bus.publish(
            Event::new(EventKind::CancelRequested)
                .with_task(Arc::clone(&entry.name))
                .with_op_id(handle.id),
        );
        entry.token.cancel();
        Ok(true)
    }

    /// Returns the current state of one operation.
    pub fn state(&self, handle: &OperationHandle) -> Result<OperationState, RuntimeError> {
        self.check_owner(handle)?;
        self.registry
            .state(handle.id)
            .ok_or(RuntimeError::UnknownHandle { id: handle.id })
    }

    /// Returns sorted names of operations that have not settled yet.
    pub fn list(&self) -> Vec<String> {
        self.registry.live_names()
    }

    /// True if an operation named `name` has not settled yet.
    pub fn is_alive(&self, name: &str) -> bool {
        self.registry.is_alive(name)
    }

    /// Waits for every handle and returns their outcomes in input order.
    ///
    /// All handles are validated before anything is awaited: an unknown handle
    /// yields [`RuntimeError::UnknownHandle`], a handle gathered before (or listed
    /// twice) yields [`RuntimeError::AlreadyGathered`].
    pub async fn gather_all(
        &self,
        handles: &[OperationHandle],
    ) -> Result<Vec<Outcome<T>>, RuntimeError> {
        for h in handles {
            self.check_owner(h)?;
        }
        let ids: Vec<u64> = handles.iter().map(|h| h.id).collect();
        let taken = self.registry.take_joins(&ids)?;

        let mut outcomes = Vec::with_capacity(taken.len());
        for t in taken {
            let id = t.id;
            outcomes.push(self.collect(t).await);
            self.registry.retire(id);
        }
        Ok(outcomes)
    }

    /// Cancels every operation and waits up to `Config::grace` for them to settle.
    ///
    /// Operations spawned afterwards are cancelled before they start.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        info!(live = self.list().len(), "shutdown requested");
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let grace = self.cfg.grace;
        match tokio::time::timeout(grace, self.registry.wait_settled()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.registry.live_names();
                warn!(?grace, ?stuck, "grace exceeded");
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Spawns `specs` and gathers them; `stop` completing triggers [`shutdown`](Self::shutdown).
    ///
    /// If every operation settles first, `stop` is dropped.
    /// After a stop, the outcomes still come back (mostly `Cancelled`) unless the
    /// grace period is exceeded.
    pub async fn run_until<F>(
        &self,
        specs: Vec<OperationSpec<T>>,
        stop: F,
    ) -> Result<Vec<Outcome<T>>, RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let handles: Vec<OperationHandle> = specs.into_iter().map(|s| self.spawn(s)).collect();
        let gather = self.gather_all(&handles);
        tokio::pin!(gather);

        tokio::select! {
            res = &mut gather => return res,
            () = stop => {}
        }

        self.shutdown().await?;
        gather.await
    }

    /// [`run_until`](Self::run_until) with SIGINT/SIGTERM/SIGQUIT as the stop.
    ///
    /// Without signal handlers it just waits for the operations.
    pub async fn run_until_signal(
        &self,
        specs: Vec<OperationSpec<T>>,
    ) -> Result<Vec<Outcome<T>>, RuntimeError> {
        let stop = async {
            match shutdown::wait_for_shutdown_signal().await {
                Ok(()) => info!("termination signal received"),
                Err(e) => {
                    warn!(error = %e, "signal handlers unavailable; waiting for operations");
                    std::future::pending::<()>().await;
                }
            }
        };
        self.run_until(specs, stop).await
    }

    fn check_owner(&self, handle: &OperationHandle) -> Result<(), RuntimeError> {
        if handle.owner == self.owner {
            Ok(())
        } else {
            Err(RuntimeError::UnknownHandle { id: handle.id })
        }
    }

    async fn collect(&self, t: Taken<T>) -> Outcome<T> {
        match t.join.await {
            Ok(out) => out,
            Err(join_err) => {
                let err = TaskError::fail(format!("runner terminated: {join_err}"));
                if t.state.set(OperationState::Failed) {
                    self.bus.publish(
                        Event::new(EventKind::OperationFailed)
                            .with_task(t.name)
                            .with_op_id(t.id)
                            .with_reason(err.to_string()),
                    );
                }
                Outcome::Error(err)
            }
        }
    }
}

impl<T> Drop for TaskSupervisor<T> {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}

/// Forwards bus events to the subscriber set until the supervisor is dropped.
fn spawn_listener(bus: &Bus, subs: SubscriberSet, stop: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event listener lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = stop.cancelled() => break,
            }
        }
        debug!("event listener stopped");
        subs.shutdown().await;
    });
}
