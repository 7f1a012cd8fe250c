use std::sync::{Arc, Mutex};
use std::time::Duration;

use tasklane::ConcurrencyLimiter;
use tasklane::scenarios::batch;

#[tokio::test(start_paused = true)]
async fn ten_jobs_three_at_a_time_take_four_waves() {
    let report = batch::limited(10, 3, Duration::from_secs(1)).await.unwrap();

    assert_eq!(report.outcomes.len(), 10);
    assert!(report.outcomes.iter().all(|o| o.is_value()));
    assert_eq!(report.peak, 3);
    assert!(report.elapsed >= Duration::from_secs(4));
    assert!(report.elapsed < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn waiters_are_admitted_in_arrival_order() {
    let limiter = ConcurrencyLimiter::new(1).unwrap();
    let held = limiter.acquire().await.unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut waiters = Vec::new();
    for idx in 0..5 {
        let limiter = limiter.clone();
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            let _permit = limiter.acquire().await.unwrap();
            order.lock().unwrap().push(idx);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }));
        // Let this waiter enqueue before the next one arrives.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    drop(held);
    for w in waiters {
        w.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(limiter.in_use(), 0);
    assert_eq!(limiter.acquired(), limiter.released());
}

#[tokio::test]
async fn permit_is_returned_when_the_body_fails() {
    let limiter = ConcurrencyLimiter::new(2).unwrap();
    let res: Result<Result<(), &str>, _> = limiter.with_permit(async { Err("boom") }).await;
    assert_eq!(res.unwrap(), Err("boom"));
    assert_eq!(limiter.available(), 2);
}

#[test]
fn zero_permits_is_invalid() {
    assert!(ConcurrencyLimiter::new(0).is_err());
}
