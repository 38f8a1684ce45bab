//! Bounded-retry optimistic transactions
//!
//! ## Attempt Sequence
//!
//! ```text
//! 1. watch(keys)         - capture versions of every read dependency
//! 2. read(store)         - inspect current values, decide
//!      NoOp              → unwatch, return NoOp
//!      Abort(reason)     → unwatch, return Aborted(reason)
//!      Proceed(plan)     → continue
//! 3. write(&plan, batch) - buffer mutations
//! 4. commit(watch, batch)
//!      Committed         → return replies
//!      Conflict          → deadline passed? return TimedOut : goto 1
//! ```
//!
//! Retries are immediate. Contention costs latency, never a lock.
//!
//! ## Purity Requirement
//!
//! Both closures may run once per attempt. They must not have effects
//! outside the store reads and the batch they are handed: no I/O and no
//! mutation of captured state that a later attempt would observe.
//!
//! ## Watch discipline
//!
//! Every key whose value informs the write must be in the watch set. A key
//! read but not watched is a silent lost-update bug.

use crate::metrics::TransactionMetrics;
use ratchet_core::{Batch, CommitOutcome, Reply, Store, StoreResult};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Decision made by the read phase of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadPhase<P, R> {
    /// Build and commit the write batch from this plan
    Proceed(P),
    /// Nothing to write; succeed with no effect
    NoOp,
    /// A precondition failed; stop without retrying
    Abort(R),
}

/// Final result of an optimistic transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TxnOutcome<R> {
    /// The batch was applied
    Committed {
        /// Reply of every batched command, in order
        replies: Vec<Reply>,
        /// Attempts taken, including the successful one
        attempts: u32,
    },
    /// The read phase decided no write was needed
    NoOp,
    /// The read phase rejected the operation
    Aborted(R),
    /// Conflicts persisted until the deadline
    TimedOut {
        /// Attempts made before giving up
        attempts: u32,
    },
}

impl<R> TxnOutcome<R> {
    /// Whether the batch was applied
    pub fn is_committed(&self) -> bool {
        matches!(self, TxnOutcome::Committed { .. })
    }

    /// Whether the deadline ran out
    pub fn is_timed_out(&self) -> bool {
        matches!(self, TxnOutcome::TimedOut { .. })
    }

    /// Replies of a committed batch
    pub fn replies(&self) -> Option<&[Reply]> {
        match self {
            TxnOutcome::Committed { replies, .. } => Some(replies),
            _ => None,
        }
    }
}

/// Watch-validate-commit driver.
///
/// # Example
///
/// ```ignore
/// let outcome = OptimisticTransaction::new(store)
///     .watch(["inventory:17"])
///     .timeout(Duration::from_secs(5))
///     .run(
///         |store| {
///             if store.sismember("inventory:17", "ItemL")? {
///                 Ok(ReadPhase::Proceed(()))
///             } else {
///                 Ok(ReadPhase::Abort("not held"))
///             }
///         },
///         |_, batch| {
///             batch.zadd("market:", "ItemL.17", 97.0).srem("inventory:17", ["ItemL"]);
///         },
///     )?;
/// ```
pub struct OptimisticTransaction<'a> {
    store: &'a dyn Store,
    metrics: Option<&'a TransactionMetrics>,
    keys: Vec<String>,
    timeout: Duration,
    label: &'static str,
}

impl<'a> OptimisticTransaction<'a> {
    /// Default deadline when none is configured
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Start describing a transaction against `store`
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            metrics: None,
            keys: Vec::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            label: "txn",
        }
    }

    /// Add keys to the watch set
    pub fn watch<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Wall-clock budget for retries
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Counters to update
    pub fn metrics(mut self, metrics: &'a TransactionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Name used in log events
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Execute until commit, no-op, abort or deadline.
    ///
    /// At least one attempt is always made; the deadline is checked after
    /// each conflict. Store errors end the transaction immediately and are
    /// returned as `Err`.
    pub fn run<P, R, Read, Write>(self, mut read: Read, mut write: Write) -> StoreResult<TxnOutcome<R>>
    where
        Read: FnMut(&dyn Store) -> StoreResult<ReadPhase<P, R>>,
        Write: FnMut(&P, &mut Batch),
    {
        let deadline = Instant::now() + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            trace!(txn = self.label, attempt = attempts, keys = ?self.keys, "attempt");

            let watch = self.store.watch(&self.keys)?;

            let plan = match read(self.store) {
                Ok(ReadPhase::Proceed(plan)) => plan,
                Ok(ReadPhase::NoOp) => {
                    self.store.unwatch(watch);
                    self.with_metrics(TransactionMetrics::record_no_op);
                    return Ok(TxnOutcome::NoOp);
                }
                Ok(ReadPhase::Abort(reason)) => {
                    self.store.unwatch(watch);
                    self.with_metrics(TransactionMetrics::record_abort);
                    return Ok(TxnOutcome::Aborted(reason));
                }
                Err(e) => {
                    self.store.unwatch(watch);
                    return Err(e);
                }
            };

            let mut batch = Batch::new();
            write(&plan, &mut batch);

            match self.store.commit(&watch, batch)? {
                CommitOutcome::Committed(replies) => {
                    self.with_metrics(TransactionMetrics::record_commit);
                    return Ok(TxnOutcome::Committed { replies, attempts });
                }
                CommitOutcome::Conflict => {
                    self.with_metrics(TransactionMetrics::record_conflict);
                    debug!(txn = self.label, attempt = attempts, "watched key changed, retrying");
                    if Instant::now() >= deadline {
                        self.with_metrics(TransactionMetrics::record_timeout);
                        warn!(
                            txn = self.label,
                            attempts,
                            timeout_ms = self.timeout.as_millis() as u64,
                            "gave up after repeated conflicts"
                        );
                        return Ok(TxnOutcome::TimedOut { attempts });
                    }
                }
            }
        }
    }

    fn with_metrics(&self, record: impl FnOnce(&TransactionMetrics)) {
        if let Some(metrics) = self.metrics {
            record(metrics);
        }
    }
}
