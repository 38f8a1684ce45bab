//! # Ratchet
//!
//! Optimistic coordination primitives over a shared key-value store.
//!
//! Ratchet turns a watch/commit store into a small set of race-free
//! building blocks: a marketplace ledger, multi-precision time-series
//! counters with retention, and hourly rolling statistics. Every
//! multi-key read-modify-write is an optimistic transaction that retries
//! on conflict until its deadline.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ratchet::prelude::*;
//!
//! let ratchet = Ratchet::in_memory()?;
//!
//! ratchet.market.create_user("17", "Frank", 43)?;
//! ratchet.market.add_to_inventory("17", &["ItemL"])?;
//! assert_eq!(ratchet.market.list_item("ItemL", "17", 97)?, ListOutcome::Listed);
//!
//! ratchet.counters.update_counter("hits", 1)?;
//! let recent = ratchet.counters.get_counter("hits", 5)?;
//!
//! let timed = ratchet.stats.time("ProfilePage", || render())?;
//! ```
//!
//! ## Progressive Disclosure
//!
//! 1. **Simple** - configured deadline: `market.list_item(item, seller, price)`
//! 2. **Full control** - explicit deadline: `market.list_item_with_timeout(.., timeout)`
//! 3. **Custom workflows** - drive [`OptimisticTransaction`] against [`Ratchet::store`]
//!
//! ## Primitives
//!
//! - [`Market`] - item listing and purchasing
//! - [`Counters`] / [`CounterCleaner`] - time-series counters and their sweeper
//! - [`Stats`] - hourly min/max/count/sum/sumsq aggregates

#![warn(missing_docs)]

pub mod config;
mod database;
mod error;
mod types;

pub mod prelude;

// Re-export main entry points
pub use database::{Ratchet, RatchetBuilder};
pub use error::{Error, Result};

// Re-export types
pub use types::*;
