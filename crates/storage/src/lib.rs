//! Storage layer for Ratchet
//!
//! This crate provides [`MemoryStore`], an in-process implementation of the
//! [`ratchet_core::Store`] command surface:
//! - Strings, hashes, sets and sorted sets under one keyspace
//! - Per-key versions driving watch/commit conflict detection
//! - All-or-nothing batch commits with an undo log
//! - Lazy key expiry

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod sorted_set;

pub use memory::MemoryStore;
pub use sorted_set::SortedSet;
