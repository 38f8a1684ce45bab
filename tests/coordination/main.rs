//! Coordination Integration Test Suite
//!
//! Exercises the primitives end to end through the `Ratchet` facade,
//! including contention from many threads against one store.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test coordination
//! cargo test --test coordination market::
//! ```

use std::sync::Arc;

use ratchet::prelude::*;
use ratchet::{Batch, CommitOutcome, LexBound, Reply, ScoreBound, StoreResult, WatchSet};

// Test modules
pub mod config;
pub mod counters;
pub mod market;
pub mod stats;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Instance over a fresh in-memory store and the system clock
pub fn create_ratchet() -> Ratchet {
    init_tracing();
    Ratchet::in_memory().expect("in-memory instance")
}

/// Instance whose clock starts at `epoch` seconds and only moves when told
pub fn create_ratchet_at(epoch: i64) -> (Ratchet, Arc<ManualClock>) {
    create_ratchet_with(epoch, RatchetConfig::default())
}

/// Instance with a manual clock and explicit configuration
pub fn create_ratchet_with(epoch: i64, config: RatchetConfig) -> (Ratchet, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::at_epoch(epoch));
    let ratchet = Ratchet::builder()
        .clock(clock.clone())
        .config(config)
        .build()
        .expect("valid configuration");
    (ratchet, clock)
}

/// Instance over a [`ContendedStore`], plus the store for seeding data
pub fn create_contended_ratchet(epoch: i64) -> (Ratchet, Arc<ContendedStore>) {
    init_tracing();
    let store = Arc::new(ContendedStore::default());
    let ratchet = Ratchet::builder()
        .store(store.clone())
        .clock(Arc::new(ManualClock::at_epoch(epoch)))
        .build()
        .expect("valid configuration");
    (ratchet, store)
}

/// Store where every watched key looks modified by the time of commit, as
/// if another writer always got in first. Reads and pipelines pass through.
#[derive(Debug, Default)]
pub struct ContendedStore {
    inner: MemoryStore,
}

impl Store for ContendedStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.inner.hget(key, field)
    }

    fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        self.inner.hgetall(key)
    }

    fn hkeys(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.hkeys(key)
    }

    fn hlen(&self, key: &str) -> StoreResult<usize> {
        self.inner.hlen(key)
    }

    fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.sismember(key, member)
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.smembers(key)
    }

    fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.inner.zscore(key, member)
    }

    fn zcard(&self, key: &str) -> StoreResult<usize> {
        self.inner.zcard(key)
    }

    fn zrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<(String, f64)>> {
        self.inner.zrange(key, start, stop)
    }

    fn zrevrangebyscore(
        &self,
        key: &str,
        max: ScoreBound,
        min: ScoreBound,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(String, f64)>> {
        self.inner.zrevrangebyscore(key, max, min, limit)
    }

    fn zrangebylex(
        &self,
        key: &str,
        min: &LexBound,
        max: &LexBound,
        limit: Option<usize>,
    ) -> StoreResult<Vec<String>> {
        self.inner.zrangebylex(key, min, max, limit)
    }

    fn watch(&self, keys: &[String]) -> StoreResult<WatchSet> {
        let watch = self.inner.watch(keys)?;
        Ok(WatchSet::from_versions(
            watch.entries().iter().map(|(key, version)| (key.clone(), version + 1)),
        ))
    }

    fn commit(&self, watch: &WatchSet, batch: Batch) -> StoreResult<CommitOutcome> {
        self.inner.commit(watch, batch)
    }

    fn pipeline(&self, batch: Batch) -> StoreResult<Vec<Reply>> {
        self.inner.pipeline(batch)
    }
}
