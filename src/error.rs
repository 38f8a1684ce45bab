//! Unified error type for Ratchet.
//!
//! Business outcomes (an item not held, a price that moved, a deadline that
//! ran out) are returned as outcome values by each primitive. This type only
//! carries failures of the store or of setup.

use crate::config::ConfigError;
use ratchet_core::{InvalidConfig, StoreError};
use thiserror::Error;

/// All Ratchet errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A key an operation requires does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A key holds a different kind of value
    #[error("wrong type for {key}: expected {expected}, got {actual}")]
    WrongType {
        /// Offending key
        key: String,
        /// Kind the operation needs
        expected: String,
        /// Kind stored under the key
        actual: String,
    },

    /// A stored value or argument is unusable
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The backing store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Configuration could not be loaded or validated
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Ratchet operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Only connectivity failures may succeed when repeated unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NoSuchKey(key) => Error::NotFound(key),
            StoreError::WrongType {
                key,
                expected,
                actual,
            } => Error::WrongType {
                key,
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
            StoreError::NotAnInteger { key } => {
                Error::InvalidValue(format!("{} does not hold an integer", key))
            }
            StoreError::Overflow { key } => {
                Error::InvalidValue(format!("increment of {} would overflow", key))
            }
            StoreError::InvalidArgument(msg) => Error::InvalidValue(msg),
            StoreError::Unavailable(msg) => Error::Unavailable(msg),
        }
    }
}

impl From<InvalidConfig> for Error {
    fn from(e: InvalidConfig) -> Self {
        Error::Config(ConfigError::Invalid(e))
    }
}
