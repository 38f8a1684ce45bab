//! Primitives for Ratchet
//!
//! Each primitive is a stateless facade over a shared [`Context`]:
//! - [`Market`]: item listing and purchase workflows
//! - [`Counters`] / [`CounterCleaner`]: multi-precision time-series counters
//!   and their retention sweeper
//! - [`Stats`] / [`AccessTimer`]: hourly min/max/count/sum/sumsq aggregates
//!
//! All state lives in the store. Every multi-key read-modify-write runs
//! through [`ratchet_concurrency::OptimisticTransaction`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleaner;
pub mod context;
pub mod counters;
pub mod market;
pub mod stats;

pub use cleaner::{CleanerHandle, CounterCleaner, StopSignal, SweepReport};
pub use context::Context;
pub use counters::{bucket_start, Counters};
pub use market::{ListOutcome, Listing, Market, PurchaseOutcome, MAX_PRICE};
pub use stats::{AccessTimer, Stats, StatsSummary, StatsUpdate};
