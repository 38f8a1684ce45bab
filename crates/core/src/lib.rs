//! Core types for Ratchet
//!
//! This crate defines the seams every other crate builds on:
//! - [`Store`]: the command surface of the backing key-value store
//! - [`Command`] / [`Batch`] / [`Reply`]: buffered writes and their results
//! - [`WatchSet`] / [`CommitOutcome`]: the watch/commit primitives used by OCC
//! - [`Clock`]: injectable wall-clock time
//! - [`config`]: tunables shared by the higher layers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CounterConfig, InvalidConfig, MarketConfig, RatchetConfig, StatsConfig, TransactionConfig,
    DEFAULT_PRECISIONS,
};
pub use error::{StoreError, StoreResult};
pub use traits::Store;
pub use types::{
    Aggregate, Batch, Command, CommitOutcome, LexBound, Reply, ScoreBound, WatchSet,
};
