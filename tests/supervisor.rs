use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tasklane::{
    Config, Event, EventKind, OperationFn, OperationRef, OperationSpec, OperationState, Outcome,
    RuntimeError, Subscribe, TaskError, TaskSupervisor, sleep_or_cancel,
};

fn sleeper(name: &'static str, dur: Duration, value: u32) -> OperationRef<u32> {
    OperationFn::arc(name, move |ctx: CancellationToken| async move {
        sleep_or_cancel(&ctx, dur).await?;
        Ok::<u32, TaskError>(value)
    })
}

fn failing(name: &'static str, msg: &'static str) -> OperationRef<u32> {
    OperationFn::arc(name, move |_ctx: CancellationToken| async move {
        Err::<u32, _>(TaskError::fail(msg))
    })
}

/// Ignores its token entirely.
fn stubborn(name: &'static str, dur: Duration) -> OperationRef<u32> {
    OperationFn::arc(name, move |_ctx: CancellationToken| async move {
        tokio::time::sleep(dur).await;
        Ok::<u32, TaskError>(0)
    })
}

#[tokio::test(start_paused = true)]
async fn gather_returns_every_outcome_in_input_order() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let slow = sup.spawn_op(sleeper("slow", Duration::from_secs(3), 1));
    let bad = sup.spawn_op(failing("bad", "division by zero"));
    let fast = sup.spawn_op(sleeper("fast", Duration::from_secs(1), 3));

    let out = sup.gather_all(&[slow, bad, fast]).await.unwrap();
    assert_eq!(
        out,
        vec![
            Outcome::Value(1),
            Outcome::Error(TaskError::fail("division by zero")),
            Outcome::Value(3),
        ]
    );
    assert_eq!(sup.state(&bad).unwrap(), OperationState::Failed);
    assert_eq!(sup.state(&slow).unwrap(), OperationState::Completed);
}

#[tokio::test]
async fn gather_of_nothing_is_empty() {
    let sup: TaskSupervisor<u32> = TaskSupervisor::new(Config::default()).unwrap();
    assert!(sup.gather_all(&[]).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn handles_are_single_use_and_owner_bound() {
    let a = TaskSupervisor::new(Config::default()).unwrap();
    let b: TaskSupervisor<u32> = TaskSupervisor::new(Config::default()).unwrap();
    let h = a.spawn_op(sleeper("x", Duration::from_millis(10), 7));
    let other = a.spawn_op(sleeper("y", Duration::from_millis(10), 8));

    assert!(matches!(b.gather_all(&[h]).await, Err(RuntimeError::UnknownHandle { .. })));
    assert!(matches!(b.cancel(&h), Err(RuntimeError::UnknownHandle { .. })));

    // Duplicate in one call is rejected before anything is taken.
    assert!(matches!(
        a.gather_all(&[h, other, h]).await,
        Err(RuntimeError::AlreadyGathered { .. })
    ));

    assert_eq!(a.gather_all(&[h, other]).await.unwrap(), vec![Outcome::Value(7), Outcome::Value(8)]);
    assert!(matches!(a.gather_all(&[h]).await, Err(RuntimeError::AlreadyGathered { .. })));
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_run_reports_cancelled_and_spares_siblings() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let a = sup.spawn_op(sleeper("A", Duration::from_secs(5), 1));
    let b = sup.spawn_op(sleeper("B", Duration::from_secs(3), 2));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sup.state(&a).unwrap(), OperationState::Running);
    assert!(sup.cancel(&a).unwrap());

    let out = sup.gather_all(&[a, b]).await.unwrap();
    assert_eq!(out, vec![Outcome::Cancelled, Outcome::Value(2)]);
    assert_eq!(sup.state(&a).unwrap(), OperationState::Cancelled);

    // Already terminal: nothing to cancel.
    assert!(!sup.cancel(&b).unwrap());
}

#[tokio::test(start_paused = true)]
async fn cancel_that_arrives_after_the_value_is_ignored() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let h = sup.spawn_op(sleeper("quick", Duration::from_millis(5), 9));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!sup.cancel(&h).unwrap());
    assert_eq!(sup.gather_all(&[h]).await.unwrap(), vec![Outcome::Value(9)]);
}

#[tokio::test]
async fn cancel_before_start_never_runs_the_body() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let ran = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&ran);
    let op: OperationRef<u32> = OperationFn::arc("never", move |_ctx: CancellationToken| {
        seen.store(true, Ordering::SeqCst);
        async { Ok::<u32, TaskError>(1) }
    });

    // current_thread runtime: the runner has not been polled yet.
    let h = sup.spawn_op(op);
    assert!(sup.cancel(&h).unwrap());

    assert_eq!(sup.gather_all(&[h]).await.unwrap(), vec![Outcome::Cancelled]);
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn deadline_on_spec_yields_timeout() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let spec = OperationSpec::new(sleeper("slow", Duration::from_secs(5), 1))
        .with_timeout(Some(Duration::from_secs(3)));
    let fast = OperationSpec::new(sleeper("fast", Duration::from_secs(1), 2))
        .with_timeout(Some(Duration::from_secs(3)));
    let slow = sup.spawn(spec);
    let fast = sup.spawn(fast);

    let out = sup.gather_all(&[slow, fast]).await.unwrap();
    assert_eq!(out[0], Outcome::Timeout { timeout: Duration::from_secs(3) });
    assert_eq!(out[1], Outcome::Value(2));
    assert_eq!(sup.state(&slow).unwrap(), OperationState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn config_timeout_applies_through_spawn_op() {
    let cfg = Config {
        timeout: Duration::from_secs(1),
        ..Config::default()
    };
    let sup = TaskSupervisor::new(cfg).unwrap();
    let h = sup.spawn_op(sleeper("slow", Duration::from_secs(10), 1));
    assert!(sup.gather_all(&[h]).await.unwrap()[0].is_timeout());
}

#[tokio::test(start_paused = true)]
async fn global_limit_caps_running_bodies() {
    let cfg = Config {
        max_concurrent: 2,
        ..Config::default()
    };
    let sup = TaskSupervisor::new(cfg).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..6u32)
        .map(|i| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let op: OperationRef<u32> = OperationFn::arc(format!("job-{i}"), move |ctx: CancellationToken| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep_or_cancel(&ctx, Duration::from_secs(1)).await?;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<u32, TaskError>(i)
                }
            });
            sup.spawn_op(op)
        })
        .collect();

    let started = tokio::time::Instant::now();
    let out = sup.gather_all(&handles).await.unwrap();
    assert!(out.iter().all(Outcome::is_value));
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_cooperative_operations() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let a = sup.spawn_op(sleeper("a", Duration::from_secs(60), 1));
    let b = sup.spawn_op(sleeper("b", Duration::from_secs(60), 2));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sup.list(), vec!["a".to_string(), "b".to_string()]);

    sup.shutdown().await.unwrap();
    assert!(sup.list().is_empty());
    assert_eq!(sup.gather_all(&[a, b]).await.unwrap(), vec![Outcome::Cancelled, Outcome::Cancelled]);

    // Anything spawned after shutdown is cancelled before it starts.
    let late = sup.spawn_op(sleeper("late", Duration::from_millis(1), 3));
    assert_eq!(sup.gather_all(&[late]).await.unwrap(), vec![Outcome::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_reports_operations_stuck_past_grace() {
    let cfg = Config {
        grace: Duration::from_millis(100),
        ..Config::default()
    };
    let sup = TaskSupervisor::new(cfg).unwrap();
    let mut events = sup.bus().subscribe();
    let _ok = sup.spawn_op(sleeper("polite", Duration::from_secs(60), 1));
    let _stuck = sup.spawn_op(stubborn("stubborn", Duration::from_secs(60)));
    tokio::time::sleep(Duration::from_millis(10)).await;

    match sup.shutdown().await {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(100));
            assert_eq!(stuck, vec!["stubborn".to_string()]);
        }
        other => panic!("unexpected shutdown result: {other:?}"),
    }
    assert!(sup.is_alive("stubborn"));
    assert!(!sup.is_alive("polite"));

    let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert_eq!(kinds.last(), Some(&EventKind::GraceExceeded));
}

#[tokio::test(start_paused = true)]
async fn run_until_stop_shuts_down_and_still_returns_outcomes() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let mut events = sup.bus().subscribe();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = stop_tx.send(());
    });

    let specs = vec![
        OperationSpec::new(sleeper("quick", Duration::from_millis(10), 7)),
        OperationSpec::new(sleeper("slow-a", Duration::from_secs(60), 1)),
        OperationSpec::new(sleeper("slow-b", Duration::from_secs(60), 2)),
    ];
    let started = tokio::time::Instant::now();
    let outcomes = sup
        .run_until(specs, async {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();

    assert_eq!(outcomes, vec![Outcome::Value(7), Outcome::Cancelled, Outcome::Cancelled]);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(sup.list().is_empty());

    let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert!(kinds.contains(&EventKind::AllStoppedWithin));
}

#[tokio::test(start_paused = true)]
async fn run_until_without_stop_gathers_normally() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let mut events = sup.bus().subscribe();
    let specs = vec![
        OperationSpec::new(sleeper("a", Duration::from_millis(20), 1)),
        OperationSpec::new(failing("b", "nope")),
    ];

    let outcomes = sup
        .run_until(specs, std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(outcomes, vec![Outcome::Value(1), Outcome::Error(TaskError::fail("nope"))]);
    let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).map(|e| e.kind).collect();
    assert!(!kinds.contains(&EventKind::ShutdownRequested));
}

#[tokio::test(start_paused = true)]
async fn every_operation_publishes_exactly_one_terminal_event() {
    let sup = TaskSupervisor::new(Config::default()).unwrap();
    let mut events = sup.bus().subscribe();

    let ok = sup.spawn_op(sleeper("ok", Duration::from_millis(10), 1));
    let bad = sup.spawn_op(failing("bad", "nope"));
    let cancelled = sup.spawn_op(sleeper("cancelled", Duration::from_secs(10), 3));
    let timed = sup.spawn(
        OperationSpec::new(sleeper("timed", Duration::from_secs(10), 4)).with_timeout(Some(Duration::from_secs(1))),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    sup.cancel(&cancelled).unwrap();
    sup.gather_all(&[ok, bad, cancelled, timed]).await.unwrap();

    let mut terminal: Vec<(u64, EventKind)> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| e.kind.is_terminal())
        .map(|e| (e.op_id.unwrap(), e.kind))
        .collect();
    terminal.sort_by_key(|(id, _)| *id);
    assert_eq!(
        terminal,
        vec![
            (ok.id(), EventKind::OperationCompleted),
            (bad.id(), EventKind::OperationFailed),
            (cancelled.id(), EventKind::OperationCancelled),
            (timed.id(), EventKind::TimeoutHit),
        ]
    );
}

struct Recorder {
    seen: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.seen.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn subscribers_receive_lifecycle_events() {
    let recorder = Arc::new(Recorder {
        seen: Mutex::new(Vec::new()),
    });
    let sup = TaskSupervisor::builder(Config::default())
        .with_subscriber(recorder.clone())
        .build()
        .unwrap();

    let h = sup.spawn_op(sleeper("one", Duration::from_millis(1), 1));
    sup.gather_all(&[h]).await.unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if recorder.seen.lock().unwrap().contains(&EventKind::OperationCompleted) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(delivered.is_ok(), "completion event never reached the subscriber");

    let seen = recorder.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            EventKind::OperationSpawned,
            EventKind::OperationStarting,
            EventKind::OperationCompleted,
        ]
    );
}
