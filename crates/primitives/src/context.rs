//! Shared handles for one deployment
//!
//! A `Context` bundles the store handle, configuration, clock and metrics
//! that every primitive needs. It is passed explicitly and cheap to clone;
//! two contexts never share state unless built from the same handles, so
//! tests can run side by side without interfering.

use ratchet_concurrency::{OptimisticTransaction, TransactionMetrics};
use ratchet_core::{Clock, RatchetConfig, Store, SystemClock};
use std::sync::Arc;

/// Store, configuration, clock and metrics shared by the primitives.
#[derive(Clone)]
pub struct Context {
    store: Arc<dyn Store>,
    config: Arc<RatchetConfig>,
    clock: Arc<dyn Clock>,
    metrics: Arc<TransactionMetrics>,
}

impl Context {
    /// Context with default configuration and the system clock
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_parts(store, RatchetConfig::default(), Arc::new(SystemClock))
    }

    /// Context from explicit parts
    pub fn with_parts(store: Arc<dyn Store>, config: RatchetConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock,
            metrics: Arc::new(TransactionMetrics::new()),
        }
    }

    /// The backing store
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Active configuration
    pub fn config(&self) -> &RatchetConfig {
        &self.config
    }

    /// Time source
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Transaction counters
    pub fn metrics(&self) -> &TransactionMetrics {
        &self.metrics
    }

    /// Transaction wired to this context's store, metrics and default deadline
    pub fn transaction(&self, label: &'static str) -> OptimisticTransaction<'_> {
        OptimisticTransaction::new(self.store())
            .metrics(self.metrics())
            .timeout(self.config.transactions.default_timeout())
            .label(label)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
