//! Time-Series Counter Tests
//!
//! Bucketing, additivity, retention, and registry safety while the sweeper
//! races with writers.

use crate::*;
use proptest::prelude::*;
use ratchet::{CounterConfig, DEFAULT_PRECISIONS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

const T0: i64 = 1_700_000_000;

fn config_with(precisions: Vec<u64>, sample_count: u64) -> RatchetConfig {
    RatchetConfig {
        counters: CounterConfig {
            precisions,
            sample_count,
            ..CounterConfig::default()
        },
        ..RatchetConfig::default()
    }
}

// =============================================================================
// BUCKETING
// =============================================================================

#[test]
fn test_update_uses_context_clock() {
    let (ratchet, clock) = create_ratchet_at(T0);
    ratchet.counters.update_counter("hits", 1).unwrap();
    clock.advance(Duration::from_secs(5));
    ratchet.counters.update_counter("hits", 1).unwrap();

    let per_second = ratchet.counters.get_counter("hits", 1).unwrap();
    assert_eq!(per_second, vec![(T0 as u64, 1), (T0 as u64 + 5, 1)]);

    let per_day = ratchet.counters.get_counter("hits", 86_400).unwrap();
    assert_eq!(per_day.len(), 1);
    assert_eq!(per_day[0].1, 2);

    let known = ratchet.counters.known_counters().unwrap();
    assert_eq!(known.len(), DEFAULT_PRECISIONS.len());
}

#[test]
fn test_concurrent_updates_lose_nothing() {
    const THREADS: usize = 8;
    const UPDATES: i64 = 200;

    let (ratchet, _clock) = create_ratchet_at(T0);
    let ratchet = Arc::new(ratchet);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ratchet = Arc::clone(&ratchet);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..UPDATES {
                    ratchet.counters.update_counter("hits", 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for precision in DEFAULT_PRECISIONS {
        let total: i64 = ratchet
            .counters
            .get_counter("hits", precision)
            .unwrap()
            .iter()
            .map(|(_, c)| c)
            .sum();
        assert_eq!(total, THREADS as i64 * UPDATES, "precision {}", precision);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_buckets_sum_to_updates(
        updates in proptest::collection::vec((0u64..20_000, -50i64..50), 1..40)
    ) {
        let (ratchet, _clock) = create_ratchet_with(T0, config_with(vec![1, 60, 3600], 100));
        for (offset, amount) in &updates {
            ratchet
                .counters
                .update_counter_at("p", *amount, (T0 as u64 + offset) as f64)
                .unwrap();
        }
        let expected: i64 = updates.iter().map(|(_, a)| a).sum();
        for precision in [1, 60, 3600] {
            let buckets = ratchet.counters.get_counter("p", precision).unwrap();
            let total: i64 = buckets.iter().map(|(_, c)| c).sum();
            prop_assert_eq!(total, expected);
            prop_assert!(buckets.windows(2).all(|w| w[0].0 < w[1].0));
            prop_assert!(buckets.iter().all(|(b, _)| b % precision == 0));
        }
    }
}

// =============================================================================
// RETENTION
// =============================================================================

#[test]
fn test_sweep_keeps_only_retention_window() {
    let (ratchet, clock) = create_ratchet_with(T0, config_with(vec![5], 4));
    for offset in (0..100).step_by(5) {
        ratchet
            .counters
            .update_counter_at("hits", 1, (T0 + offset) as f64)
            .unwrap();
    }
    clock.advance(Duration::from_secs(95));

    let report = ratchet.cleaner().sweep_pass(0).unwrap();
    assert_eq!(report.visited, 1);

    // cutoff is now - 4 * 5 = T0 + 75, inclusive
    let kept: Vec<u64> = ratchet
        .counters
        .get_counter("hits", 5)
        .unwrap()
        .into_iter()
        .map(|(b, _)| b)
        .collect();
    let expected: Vec<u64> = (80..100).step_by(5).map(|o| (T0 + o) as u64).collect();
    assert_eq!(kept, expected);
}

#[test]
fn test_registry_never_orphans_live_counters() {
    const NAMES: [&str; 4] = ["a", "b", "c", "d"];

    let (ratchet, clock) = create_ratchet_with(T0, config_with(vec![1, 5], 1));
    clock.advance(Duration::from_secs(10_000));
    let ratchet = Arc::new(ratchet);
    let running = Arc::new(AtomicBool::new(true));

    // writers keep producing already-expired buckets so every pass trims
    let writers: Vec<_> = NAMES
        .iter()
        .map(|&name| {
            let ratchet = Arc::clone(&ratchet);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut n = 0;
                while running.load(Ordering::Relaxed) {
                    ratchet
                        .counters
                        .update_counter_at(name, 1, (T0 + n % 50) as f64)
                        .unwrap();
                    n += 1;
                }
            })
        })
        .collect();

    let cleaner = ratchet.cleaner();
    let mut removed = 0;
    for pass in 0..200 {
        removed += cleaner.sweep_pass(pass).unwrap().counters_removed;
    }
    running.store(false, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }

    let known = ratchet.counters.known_counters().unwrap();
    for name in NAMES {
        for precision in [1, 5] {
            let live = !ratchet.counters.get_counter(name, precision).unwrap().is_empty();
            let registered = known.contains(&(precision, name.to_string()));
            assert!(
                !live || registered,
                "{}:{} has buckets but no registry entry",
                precision,
                name
            );
        }
    }
    tracing::debug!(removed, "registry entries removed during race");

    // once writers are gone one pass leaves no entry pointing at an empty hash
    let report = cleaner.sweep_pass(0).unwrap();
    let known = ratchet.counters.known_counters().unwrap();
    for (precision, name) in &known {
        assert!(
            !ratchet.counters.get_counter(name, *precision).unwrap().is_empty(),
            "{}:{} is registered but has no buckets",
            precision,
            name
        );
    }
    assert!(known.is_empty(), "expired counters left registered: {:?}", known);
    assert_eq!(report.visited, report.counters_removed);
}

#[test]
fn test_background_cleaner_lifecycle() {
    let (ratchet, clock) = create_ratchet_with(T0, config_with(vec![1], 2));
    ratchet.counters.update_counter("hits", 3).unwrap();
    clock.advance(Duration::from_secs(30));

    let handle = ratchet.start_cleaner().unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !ratchet.counters.known_counters().unwrap().is_empty()
        && std::time::Instant::now() < deadline
    {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!handle.is_finished());
    assert!(handle.shutdown().unwrap() >= 1);
    assert!(ratchet.counters.known_counters().unwrap().is_empty());
}
