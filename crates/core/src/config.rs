//! Tunables for the coordination layer
//!
//! Every field has a default, so an empty document is a valid configuration.
//! Parsing from TOML lives in the facade crate; this module only owns the
//! shape and its validation.
//!
//! ```toml
//! [transactions]
//! default_timeout_ms = 5000
//!
//! [counters]
//! precisions = [1, 5, 60, 300, 3600, 18000, 86400]
//! sample_count = 100
//! sweep_interval_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default counter precisions in seconds: 1s, 5s, 1m, 5m, 1h, 5h, 1d.
pub const DEFAULT_PRECISIONS: [u64; 7] = [1, 5, 60, 300, 3600, 18000, 86400];

/// A configuration value that cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid configuration: {field}: {reason}")]
pub struct InvalidConfig {
    /// Dotted path of the offending field
    pub field: &'static str,
    /// What is wrong with it
    pub reason: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatchetConfig {
    /// Optimistic transaction defaults
    pub transactions: TransactionConfig,
    /// Marketplace workflow deadlines
    pub market: MarketConfig,
    /// Time-series counter policy
    pub counters: CounterConfig,
    /// Aggregate statistics policy
    pub stats: StatsConfig,
}

impl RatchetConfig {
    /// Check every section.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        self.counters.validate()?;
        self.stats.validate()
    }
}

/// Optimistic transaction defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Deadline used when a caller does not supply one
    pub default_timeout_ms: u64,
}

impl TransactionConfig {
    /// Default deadline as a `Duration`
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5_000,
        }
    }
}

/// Marketplace workflow deadlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Deadline for `list_item`
    pub list_timeout_ms: u64,
    /// Deadline for `purchase_item`
    pub purchase_timeout_ms: u64,
}

impl MarketConfig {
    /// `list_item` deadline
    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }

    /// `purchase_item` deadline
    pub fn purchase_timeout(&self) -> Duration {
        Duration::from_millis(self.purchase_timeout_ms)
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            list_timeout_ms: 5_000,
            purchase_timeout_ms: 10_000,
        }
    }
}

/// Time-series counter policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Bucket widths in seconds, strictly ascending
    pub precisions: Vec<u64>,
    /// Buckets retained per precision before the sweeper trims them
    pub sample_count: u64,
    /// Target period of one sweeper pass
    pub sweep_interval_secs: u64,
    /// Deadline for the registry-removal transaction
    pub cleanup_timeout_ms: u64,
}

impl CounterConfig {
    /// Target sweep period
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Registry-removal deadline
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_timeout_ms)
    }

    fn validate(&self) -> Result<(), InvalidConfig> {
        if self.precisions.is_empty() {
            return Err(InvalidConfig {
                field: "counters.precisions",
                reason: "at least one precision is required".to_string(),
            });
        }
        if self.precisions.contains(&0) {
            return Err(InvalidConfig {
                field: "counters.precisions",
                reason: "precisions must be positive".to_string(),
            });
        }
        if self.precisions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(InvalidConfig {
                field: "counters.precisions",
                reason: format!("must be strictly ascending, got {:?}", self.precisions),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(InvalidConfig {
                field: "counters.sweep_interval_secs",
                reason: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            precisions: DEFAULT_PRECISIONS.to_vec(),
            sample_count: 100,
            sweep_interval_secs: 60,
            cleanup_timeout_ms: 1_000,
        }
    }
}

/// Aggregate statistics policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Deadline for `update_stats`
    pub update_timeout_ms: u64,
    /// Entries kept in the `slowest:AccessTime` ranking
    pub slowest_retained: usize,
}

impl StatsConfig {
    /// `update_stats` deadline
    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }

    fn validate(&self) -> Result<(), InvalidConfig> {
        if self.slowest_retained == 0 {
            return Err(InvalidConfig {
                field: "stats.slowest_retained",
                reason: "must keep at least one entry".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            update_timeout_ms: 5_000,
            slowest_retained: 100,
        }
    }
}
