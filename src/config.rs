//! Loading configuration from TOML.
//!
//! Every field is optional; missing sections take their defaults.
//!
//! ```toml
//! [transactions]
//! default_timeout_ms = 5000
//!
//! [market]
//! list_timeout_ms = 5000
//! purchase_timeout_ms = 10000
//!
//! [counters]
//! precisions = [1, 5, 60, 300, 3600, 18000, 86400]
//! sample_count = 100
//! sweep_interval_secs = 60
//!
//! [stats]
//! update_timeout_ms = 5000
//! slowest_retained = 100
//! ```

use ratchet_core::{InvalidConfig, RatchetConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid TOML for this schema
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are unusable
    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

/// Parse and validate configuration text.
pub fn from_toml_str(text: &str) -> Result<RatchetConfig, ConfigError> {
    let config: RatchetConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a configuration file.
pub fn load(path: impl AsRef<Path>) -> Result<RatchetConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_toml_str(&text)
}

/// Render configuration as TOML.
pub fn to_toml_string(config: &RatchetConfig) -> Result<String, toml::ser::Error> {
    toml::to_string(config)
}
