use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mayfly_forms::ratelimit::{LimitWindow, ManualClock, RateLimiter, WindowSpec};

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn standard_limiter() -> (Arc<RateLimiter<Arc<ManualClock>>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(secs(1_700_000_000)));
    let limiter = RateLimiter::with_clock(WindowSpec::standard(), Arc::clone(&clock));
    (Arc::new(limiter), clock)
}

#[test]
fn new_client_is_admitted_with_full_quota() {
    let (limiter, _) = standard_limiter();

    let remaining = limiter.remaining_quota("198.51.100.1");
    assert_eq!(remaining["minute"], 10);
    assert_eq!(remaining["hour"], 100);
    assert_eq!(remaining["day"], 1000);

    assert!(limiter.is_allowed("198.51.100.1"));
}

#[test]
fn burst_admits_exactly_the_minute_limit() {
    let (limiter, clock) = standard_limiter();

    for i in 0..10 {
        assert!(limiter.is_allowed("client"), "request {} should be admitted", i + 1);
        clock.advance(Duration::from_millis(100));
    }
    assert!(!limiter.is_allowed("client"));
    assert_eq!(limiter.remaining_quota("client")["minute"], 0);
    assert_eq!(limiter.remaining_quota("client")["hour"], 90);
}

#[test]
fn denied_client_recovers_after_window() {
    let (limiter, clock) = standard_limiter();

    for _ in 0..10 {
        assert!(limiter.is_allowed("client"));
    }
    assert!(!limiter.is_allowed("client"));

    clock.advance(secs(61));
    assert!(limiter.is_allowed("client"));
}

#[test]
fn sustained_minute_traffic_is_governed_by_minute_window() {
    let (limiter, clock) = standard_limiter();

    let mut admitted = 0;
    for _ in 0..15 {
        for _ in 0..10 {
            if limiter.is_allowed("client") {
                admitted += 1;
            }
        }
        clock.advance(secs(61));
    }

    // Each minute prune leaves only the last 60 s for the hour and day counts.
    assert_eq!(admitted, 150);
    assert_eq!(limiter.log_len("client"), 10);
    assert_eq!(limiter.remaining_quota("client")["hour"], 90);
}

#[test]
fn boundary_entries_count_inside_window() {
    let clock = Arc::new(ManualClock::new(secs(1_000)));
    let windows = WindowSpec::new(vec![LimitWindow::new("minute", secs(60), 3)]).unwrap();
    let limiter = RateLimiter::with_clock(windows, Arc::clone(&clock));

    for _ in 0..3 {
        assert!(limiter.is_allowed("client"));
    }

    clock.set(secs(1_060));
    assert_eq!(limiter.remaining_quota("client")["minute"], 0);
    assert!(!limiter.is_allowed("client"));
}

#[test]
fn queries_between_checks_do_not_change_outcome() {
    let run = |query: bool| {
        let (limiter, clock) = standard_limiter();
        let mut outcomes = Vec::new();
        for step in 0..30 {
            outcomes.push(limiter.is_allowed("client"));
            if query {
                for _ in 0..3 {
                    limiter.remaining_quota("client");
                    limiter.reset_times("client");
                    limiter.status("client");
                }
            }
            clock.advance(secs(if step % 7 == 0 { 30 } else { 2 }));
        }
        outcomes
    };

    assert_eq!(run(false), run(true));
}

#[test]
fn cleanup_keeps_recent_clients_intact() {
    let (limiter, clock) = standard_limiter();

    assert!(limiter.is_allowed("one-off"));
    clock.advance(secs(3_000));
    assert!(limiter.is_allowed("regular"));
    clock.advance(secs(30));
    assert!(limiter.is_allowed("regular"));

    assert_eq!(limiter.cleanup(secs(1_800)), 1);
    assert_eq!(limiter.client_count(), 1);
    assert_eq!(limiter.log_len("regular"), 2);
}

#[test]
fn concurrent_threads_never_over_admit() {
    let (limiter, _) = standard_limiter();
    let admitted = Arc::new(AtomicUsize::new(0));

    std::thread::scope(|scope| {
        for _ in 0..16 {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            scope.spawn(move || {
                for _ in 0..8 {
                    if limiter.is_allowed("shared") {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    assert_eq!(admitted.load(Ordering::SeqCst), 10);
    assert_eq!(limiter.log_len("shared"), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tasks_never_over_admit() {
    let (limiter, _) = standard_limiter();

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.is_allowed("shared") })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
}

#[test]
fn cleanup_races_with_admissions_safely() {
    let (limiter, clock) = standard_limiter();
    for i in 0..100 {
        assert!(limiter.is_allowed(&format!("client-{}", i)));
    }
    clock.advance(secs(90_000));

    std::thread::scope(|scope| {
        let sweeper = Arc::clone(&limiter);
        scope.spawn(move || {
            for _ in 0..10 {
                sweeper.cleanup(secs(86_400));
            }
        });
        for t in 0..4 {
            let limiter = Arc::clone(&limiter);
            scope.spawn(move || {
                for i in (t..100).step_by(4) {
                    assert!(limiter.is_allowed(&format!("client-{}", i)));
                }
            });
        }
    });

    // Every client was re-admitted, either to a fresh log or to its pruned one.
    for i in 0..100 {
        assert_eq!(limiter.log_len(&format!("client-{}", i)), 1);
    }
}
