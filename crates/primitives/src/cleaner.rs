//! Counter retention sweeper
//!
//! ## Pass structure
//!
//! ```text
//! cursor = -inf
//! loop:
//!   page = next registry members strictly after cursor   (zrangebylex)
//!   cursor = last member of page
//!   for member in page:
//!     skip unless pass % max(precision / 60, 1) == 0
//!     HDEL every bucket <= now - sample_count * precision
//!     all buckets gone? → watch hash, recheck HLEN == 0, ZREM registry entry
//! ```
//!
//! The cursor is a member, not a position. Entries removed concurrently
//! (by this sweeper or another) never shift it, so no live member is skipped.
//!
//! Between passes the sweeper sleeps so one pass starts roughly every
//! `sweep_interval`, and never less than one second. A [`StopSignal`] wakes
//! a sleeping sweeper immediately; a running pass finishes first.

use crate::context::Context;
use crate::counters::{counter_hash, member_precision, KNOWN};
use parking_lot::{Condvar, Mutex};
use ratchet_concurrency::ReadPhase;
use ratchet_core::{LexBound, StoreError, StoreResult};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Registry members fetched per cursor step
const REGISTRY_PAGE: usize = 256;

// ============================================================================
// Stop signal
// ============================================================================

/// Shutdown flag a sleeping sweeper can wait on.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    /// A signal that has not been raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake every waiter
    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.cv.notify_all();
    }

    /// Whether the signal has been raised
    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep up to `timeout`. Returns `true` if the signal was raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cv.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

// ============================================================================
// Sweeper
// ============================================================================

/// What one sweep pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pass number the report belongs to
    pub pass: u64,
    /// Registry entries visited
    pub visited: usize,
    /// Entries skipped because their precision is not due this pass
    pub skipped: usize,
    /// Buckets deleted
    pub samples_removed: usize,
    /// Registry entries removed because their hash emptied
    pub counters_removed: usize,
}

/// Trims counter buckets beyond the retention window.
#[derive(Clone, Debug)]
pub struct CounterCleaner {
    ctx: Context,
}

impl CounterCleaner {
    /// Create a sweeper over `ctx`
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Run one pass over the whole registry.
    ///
    /// `pass` decides which precisions are due: a precision of `p` seconds
    /// is swept on passes divisible by `max(p / 60, 1)`.
    pub fn sweep_pass(&self, pass: u64) -> StoreResult<SweepReport> {
        let store = self.ctx.store();
        let now = self.ctx.clock().epoch_seconds();
        let mut report = SweepReport {
            pass,
            ..SweepReport::default()
        };

        let mut cursor = LexBound::Unbounded;
        loop {
            let page =
                store.zrangebylex(KNOWN, &cursor, &LexBound::Unbounded, Some(REGISTRY_PAGE))?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = LexBound::Exclusive(last.clone());

            for member in &page {
                self.sweep_member(member, pass, now, &mut report)?;
            }
        }

        Ok(report)
    }

    fn sweep_member(
        &self,
        member: &str,
        pass: u64,
        now: f64,
        report: &mut SweepReport,
    ) -> StoreResult<()> {
        let store = self.ctx.store();
        report.visited += 1;

        let Some(precision) = member_precision(member) else {
            warn!(member = %member, "malformed counter registry entry");
            return Ok(());
        };
        if pass % (precision / 60).max(1) != 0 {
            report.skipped += 1;
            return Ok(());
        }

        let sample_count = self.ctx.config().counters.sample_count;
        let cutoff = now - sample_count.saturating_mul(precision) as f64;
        let hash = counter_hash(member);
        let mut buckets: Vec<u64> = store
            .hkeys(&hash)?
            .iter()
            .filter_map(|b| b.parse().ok())
            .collect();
        buckets.sort_unstable();

        let expired = buckets.partition_point(|&b| b as f64 <= cutoff);
        if expired > 0 {
            let fields: Vec<String> = buckets[..expired].iter().map(u64::to_string).collect();
            report.samples_removed += store.hdel(&hash, &fields)?;
        }

        // an already-empty hash is left behind by a writer whose ZADD landed
        // after this sweeper's ZREM
        if expired == buckets.len() && self.unregister_if_empty(member, &hash)? {
            report.counters_removed += 1;
        }
        Ok(())
    }

    /// Remove `member` from the registry only if its hash is still empty.
    fn unregister_if_empty(&self, member: &str, hash: &str) -> StoreResult<bool> {
        let outcome = self
            .ctx
            .transaction("counter_cleanup")
            .watch([hash])
            .timeout(self.ctx.config().counters.cleanup_timeout())
            .run(
                |store| {
                    if store.hlen(hash)? == 0 {
                        Ok(ReadPhase::<(), ()>::Proceed(()))
                    } else {
                        Ok(ReadPhase::NoOp)
                    }
                },
                |_, batch| {
                    batch.zrem(KNOWN, [member]);
                },
            )?;
        Ok(outcome.is_committed())
    }

    /// Sweep until `stop` is raised. Returns the number of passes completed.
    ///
    /// Store errors end the loop and are returned.
    pub fn run(&self, stop: &StopSignal) -> StoreResult<u64> {
        let interval = self.ctx.config().counters.sweep_interval().as_secs().max(1);
        let mut pass = 0u64;

        while !stop.is_stopped() {
            let started = Instant::now();
            let report = self.sweep_pass(pass)?;
            info!(
                pass,
                visited = report.visited,
                skipped = report.skipped,
                samples_removed = report.samples_removed,
                counters_removed = report.counters_removed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "counter sweep pass"
            );
            pass += 1;

            let spent = (started.elapsed().as_secs() + 1).min(interval);
            let pause = Duration::from_secs(interval.saturating_sub(spent).max(1));
            if stop.wait_timeout(pause) {
                break;
            }
        }

        Ok(pass)
    }

    /// Start [`CounterCleaner::run`] on a background thread.
    pub fn spawn(self) -> std::io::Result<CleanerHandle> {
        let stop = Arc::new(StopSignal::new());
        let signal = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("ratchet-counter-cleaner".to_string())
            .spawn(move || {
                let result = self.run(&signal);
                if let Err(e) = &result {
                    error!(error = %e, "counter sweeper stopped");
                }
                result
            })?;
        Ok(CleanerHandle { stop, thread })
    }
}

/// Handle to a sweeper started with [`CounterCleaner::spawn`].
#[derive(Debug)]
pub struct CleanerHandle {
    stop: Arc<StopSignal>,
    thread: JoinHandle<StoreResult<u64>>,
}

impl CleanerHandle {
    /// Whether the sweeper thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Raise the stop signal and wait for the sweeper to exit.
    ///
    /// Returns the number of passes completed, or the error that ended it.
    pub fn shutdown(self) -> StoreResult<u64> {
        self.stop.stop();
        self.thread
            .join()
            .map_err(|_| StoreError::Unavailable("counter sweeper thread panicked".to_string()))?
    }
}
