//! Rolling Statistics Tests
//!
//! Aggregation, hourly rotation, and concurrent updates.

use crate::*;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

// 2024-03-09T14:25:00Z
const AFTERNOON: i64 = 1_709_994_300;

// =============================================================================
// AGGREGATION
// =============================================================================

#[test]
fn test_known_values_summary() {
    let (ratchet, _clock) = create_ratchet_at(AFTERNOON);
    for value in [8.0, 10.0, 12.0, 6.0, 9.0] {
        ratchet.stats.update_stats("ProfilePage", "AccessTime", value).unwrap();
    }

    let summary = ratchet
        .stats
        .get_stats("ProfilePage", "AccessTime")
        .unwrap()
        .expect("recorded");
    assert_eq!(summary.count, 5.0);
    assert_eq!(summary.sum, 45.0);
    assert_eq!(summary.min, 6.0);
    assert_eq!(summary.max, 12.0);
    assert_eq!(summary.average, 9.0);
    assert!((summary.stddev - 2.236_067_977).abs() < 1e-6);
}

#[test]
fn test_contexts_and_kinds_are_independent() {
    let (ratchet, _clock) = create_ratchet_at(AFTERNOON);
    ratchet.stats.update_stats("home", "AccessTime", 1.0).unwrap();
    ratchet.stats.update_stats("home", "Bytes", 500.0).unwrap();
    ratchet.stats.update_stats("cart", "AccessTime", 3.0).unwrap();

    assert_eq!(ratchet.stats.get_stats("home", "AccessTime").unwrap().unwrap().max, 1.0);
    assert_eq!(ratchet.stats.get_stats("home", "Bytes").unwrap().unwrap().max, 500.0);
    assert_eq!(ratchet.stats.get_stats("cart", "AccessTime").unwrap().unwrap().min, 3.0);
}

#[test]
fn test_concurrent_updates_counted_exactly() {
    const THREADS: usize = 6;
    const UPDATES: usize = 50;

    let (ratchet, _clock) = create_ratchet_at(AFTERNOON);
    let ratchet = Arc::new(ratchet);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let ratchet = Arc::clone(&ratchet);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..UPDATES {
                    let value = (t * UPDATES + i) as f64;
                    let update = ratchet.stats.update_stats("api", "Latency", value).unwrap();
                    assert!(matches!(update, StatsUpdate::Recorded { .. }));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let n = (THREADS * UPDATES) as f64;
    let summary = ratchet.stats.get_stats("api", "Latency").unwrap().unwrap();
    assert_eq!(summary.count, n);
    assert_eq!(summary.sum, n * (n - 1.0) / 2.0);
    assert_eq!(summary.min, 0.0);
    assert_eq!(summary.max, n - 1.0);
}

// =============================================================================
// ROTATION
// =============================================================================

#[test]
fn test_hour_boundary_archives_window() {
    let (ratchet, clock) = create_ratchet_at(AFTERNOON);
    ratchet.stats.update_stats("c", "t", 2.0).unwrap();
    ratchet.stats.update_stats("c", "t", 4.0).unwrap();

    // 14:59:59 is still the same window
    clock.advance(Duration::from_secs(34 * 60 + 59));
    ratchet.stats.update_stats("c", "t", 6.0).unwrap();
    assert!(ratchet.stats.get_last_stats("c", "t").unwrap().is_none());

    clock.advance(Duration::from_secs(1));
    ratchet.stats.update_stats("c", "t", 100.0).unwrap();

    let last = ratchet.stats.get_last_stats("c", "t").unwrap().unwrap();
    assert_eq!(last.count, 3.0);
    assert_eq!(last.max, 6.0);
    let current = ratchet.stats.get_stats("c", "t").unwrap().unwrap();
    assert_eq!(current.count, 1.0);
    assert_eq!(current.min, 100.0);
    assert_eq!(
        ratchet.stats.window_start("c", "t").unwrap().as_deref(),
        Some("2024-03-09T15:00:00")
    );
    assert_eq!(
        ratchet.store().get("stats:c:t:pstart").unwrap().as_deref(),
        Some("2024-03-09T14:00:00")
    );
}

#[test]
fn test_idle_hours_replace_stale_archive() {
    let (ratchet, clock) = create_ratchet_at(AFTERNOON);
    ratchet.stats.update_stats("c", "t", 1.0).unwrap();
    clock.advance(Duration::from_secs(3600));
    ratchet.stats.update_stats("c", "t", 2.0).unwrap();
    clock.advance(Duration::from_secs(3 * 3600));
    ratchet.stats.update_stats("c", "t", 3.0).unwrap();

    // the archive is the window right before the current one
    let last = ratchet.stats.get_last_stats("c", "t").unwrap().unwrap();
    assert_eq!(last.sum, 2.0);
    assert_eq!(ratchet.stats.get_stats("c", "t").unwrap().unwrap().sum, 3.0);
}

#[test]
fn test_rotation_happens_once_per_hour() {
    let (ratchet, clock) = create_ratchet_at(AFTERNOON);
    ratchet.stats.update_stats("c", "t", 5.0).unwrap();
    clock.advance(Duration::from_secs(3600));

    ratchet.stats.update_stats("c", "t", 7.0).unwrap();
    ratchet.stats.update_stats("c", "t", 9.0).unwrap();

    // the second call in the new hour is a plain increment
    let last = ratchet.stats.get_last_stats("c", "t").unwrap().unwrap();
    assert_eq!(last.count, 1.0);
    assert_eq!(last.sum, 5.0);
    let current = ratchet.stats.get_stats("c", "t").unwrap().unwrap();
    assert_eq!(current.count, 2.0);
    assert_eq!(current.sum, 16.0);
}

#[test]
fn test_update_times_out_under_constant_conflict() {
    let (ratchet, _store) = create_contended_ratchet(AFTERNOON);

    let update = ratchet
        .stats
        .update_stats_with_timeout("c", "t", 5.0, Duration::from_millis(20))
        .unwrap();
    assert_eq!(update, StatsUpdate::TimedOut);

    assert!(ratchet.stats.get_stats("c", "t").unwrap().is_none());
    assert!(ratchet.stats.window_start("c", "t").unwrap().is_none());
    assert_eq!(ratchet.metrics().timed_out, 1);
}

// =============================================================================
// ACCESS TIMING
// =============================================================================

#[test]
fn test_access_timer_ranks_slowest_contexts() {
    let ratchet = create_ratchet();

    let rendered = ratchet
        .stats
        .time("ProfilePage", || {
            thread::sleep(Duration::from_millis(25));
            "<html/>"
        })
        .unwrap();
    assert_eq!(rendered, "<html/>");

    let timer = ratchet.stats.start_timer("HomePage");
    let update = timer.finish().unwrap();
    assert!(matches!(update, StatsUpdate::Recorded { count, .. } if count == 1.0));

    let slowest = ratchet.stats.slowest(10).unwrap();
    assert_eq!(slowest.len(), 2);
    assert_eq!(slowest[0].0, "ProfilePage");
    assert!(slowest[0].1 >= 0.025);

    let profile = ratchet.stats.get_stats("ProfilePage", "AccessTime").unwrap().unwrap();
    assert_eq!(profile.count, 1.0);
}
