//! Concurrency layer for Ratchet
//!
//! This crate implements optimistic concurrency control (OCC) over a store
//! that has no multi-key locks:
//! - OptimisticTransaction: watch → read → buffered write → commit, retried
//!   on conflict until a wall-clock deadline
//! - ReadPhase / TxnOutcome: conflicts, no-ops, business aborts and timeouts
//!   as values rather than errors
//! - TransactionMetrics: commit/conflict/abort counters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod metrics;
pub mod transaction;

pub use metrics::{MetricsSnapshot, TransactionMetrics};
pub use transaction::{OptimisticTransaction, ReadPhase, TxnOutcome};
