//! Public types for the Ratchet API.
//!
//! This module re-exports types from the member crates with one flat path.

// Store abstraction
pub use ratchet_core::{
    Aggregate, Batch, Command, CommitOutcome, LexBound, Reply, ScoreBound, Store, StoreError,
    StoreResult, WatchSet,
};
pub use ratchet_storage::MemoryStore;

// Time
pub use ratchet_core::{Clock, ManualClock, SystemClock};

// Configuration
pub use ratchet_core::{
    CounterConfig, InvalidConfig, MarketConfig, RatchetConfig, StatsConfig, TransactionConfig,
    DEFAULT_PRECISIONS,
};

// Transactions
pub use ratchet_concurrency::{
    MetricsSnapshot, OptimisticTransaction, ReadPhase, TransactionMetrics, TxnOutcome,
};

// Primitives
pub use ratchet_primitives::{
    AccessTimer, CleanerHandle, Context, CounterCleaner, Counters, ListOutcome, Listing, Market,
    PurchaseOutcome, Stats, StatsSummary, StatsUpdate, StopSignal, SweepReport, MAX_PRICE,
};
