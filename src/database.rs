//! Main entry point for Ratchet.
//!
//! This module provides the `Ratchet` struct, which owns one [`Context`] and
//! exposes every primitive over it.

use crate::config;
use crate::error::Result;
use ratchet_concurrency::MetricsSnapshot;
use ratchet_core::{Clock, RatchetConfig, Store, SystemClock};
use ratchet_primitives::{CleanerHandle, Context, CounterCleaner, Counters, Market, Stats};
use ratchet_storage::MemoryStore;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// One deployment of the coordination primitives.
///
/// # Example
///
/// ```ignore
/// use ratchet::prelude::*;
///
/// let ratchet = Ratchet::in_memory()?;
///
/// ratchet.market.create_user("27", "Bill", 125)?;
/// ratchet.counters.update_counter("hits", 1)?;
/// ratchet.stats.update_stats("ProfilePage", "AccessTime", 0.012)?;
///
/// let sweeper = ratchet.start_cleaner()?;
/// // ...
/// sweeper.shutdown()?;
/// ```
pub struct Ratchet {
    ctx: Context,

    /// Item listing and purchasing
    pub market: Market,

    /// Time-series counters
    pub counters: Counters,

    /// Hourly aggregate statistics
    pub stats: Stats,
}

impl Ratchet {
    /// Create an instance over a fresh in-memory store with default settings.
    pub fn in_memory() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let ratchet = Ratchet::builder()
    ///     .config_file("ratchet.toml")?
    ///     .clock(Arc::new(ManualClock::at_epoch(0)))
    ///     .build()?;
    /// ```
    pub fn builder() -> RatchetBuilder {
        RatchetBuilder::new()
    }

    /// Shared context handed to every primitive
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The backing store
    pub fn store(&self) -> &dyn Store {
        self.ctx.store()
    }

    /// Active configuration
    pub fn config(&self) -> &RatchetConfig {
        self.ctx.config()
    }

    /// A retention sweeper over this instance's counters.
    pub fn cleaner(&self) -> CounterCleaner {
        CounterCleaner::new(self.ctx.clone())
    }

    /// Start the retention sweeper on a background thread.
    pub fn start_cleaner(&self) -> Result<CleanerHandle> {
        Ok(self.cleaner().spawn()?)
    }

    /// Transaction counters accumulated by every primitive.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics().snapshot()
    }

    fn from_context(ctx: Context) -> Self {
        Self {
            market: Market::new(ctx.clone()),
            counters: Counters::new(ctx.clone()),
            stats: Stats::new(ctx.clone()),
            ctx,
        }
    }
}

impl std::fmt::Debug for Ratchet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ratchet").field("ctx", &self.ctx).finish()
    }
}

/// Builder for [`Ratchet`].
///
/// Unset parts default to a fresh [`MemoryStore`], the [`SystemClock`] and
/// [`RatchetConfig::default`].
#[derive(Default)]
pub struct RatchetBuilder {
    store: Option<Arc<dyn Store>>,
    clock: Option<Arc<dyn Clock>>,
    config: RatchetConfig,
}

impl RatchetBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing store, possibly shared with other instances.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a specific time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use this configuration.
    pub fn config(mut self, config: RatchetConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a TOML file.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = config::load(path)?;
        Ok(self)
    }

    /// Validate configuration and assemble the instance.
    pub fn build(self) -> Result<Ratchet> {
        self.config.validate()?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        debug!(
            precisions = ?self.config.counters.precisions,
            sample_count = self.config.counters.sample_count,
            "ratchet context ready"
        );
        Ok(Ratchet::from_context(Context::with_parts(store, self.config, clock)))
    }
}

impl std::fmt::Debug for RatchetBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatchetBuilder")
            .field("custom_store", &self.store.is_some())
            .field("custom_clock", &self.clock.is_some())
            .field("config", &self.config)
            .finish()
    }
}
