//! Transaction counters
//!
//! Shared by every component of one context so callers can observe how much
//! contention their workload produces.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by [`OptimisticTransaction`](crate::OptimisticTransaction).
#[derive(Debug, Default)]
pub struct TransactionMetrics {
    committed: AtomicU64,
    conflicts: AtomicU64,
    aborted: AtomicU64,
    no_ops: AtomicU64,
    timed_out: AtomicU64,
}

impl TransactionMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_no_op(&self) {
        self.no_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let committed = self.committed.load(Ordering::Relaxed);
        let conflicts = self.conflicts.load(Ordering::Relaxed);
        MetricsSnapshot {
            committed,
            conflicts,
            aborted: self.aborted.load(Ordering::Relaxed),
            no_ops: self.no_ops.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            commit_rate: if committed + conflicts == 0 {
                1.0
            } else {
                committed as f64 / (committed + conflicts) as f64
            },
        }
    }
}

/// Counter values at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    /// Transactions whose batch was applied
    pub committed: u64,
    /// Commit attempts rejected because a watched key changed
    pub conflicts: u64,
    /// Transactions stopped by a failed precondition
    pub aborted: u64,
    /// Transactions whose read phase found nothing to write
    pub no_ops: u64,
    /// Transactions that ran out of time while conflicting
    pub timed_out: u64,
    /// Committed / (committed + conflicts); 1.0 before any commit attempt
    pub commit_rate: f64,
}
