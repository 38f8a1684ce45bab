//! Error types for store operations
//!
//! `StoreError` covers everything the backing store can reject. Optimistic
//! conflicts are deliberately absent: a failed watch is reported through
//! [`CommitOutcome::Conflict`](crate::CommitOutcome) so retry drivers can
//! branch on a value instead of an error.

use thiserror::Error;

/// Errors raised by a [`Store`](crate::Store) implementation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Operation against a key holding the wrong kind of value
    #[error("WRONGTYPE operation against key '{key}' holding a {actual}, expected {expected}")]
    WrongType {
        /// Key that was accessed
        key: String,
        /// Kind the command expected
        expected: &'static str,
        /// Kind actually stored
        actual: &'static str,
    },

    /// Stored value (or hash field) is not an integer
    #[error("value at '{key}' is not an integer or out of range")]
    NotAnInteger {
        /// Key (or `key/field`) holding the bad value
        key: String,
    },

    /// Increment would overflow
    #[error("increment or decrement would overflow at '{key}'")]
    Overflow {
        /// Key being incremented
        key: String,
    },

    /// Command requires an existing key (e.g. RENAME source)
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// Malformed command arguments
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Store could not be reached or failed internally
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the error came from the transport rather than the data.
    ///
    /// Ratchet never retries these itself; connectivity policy belongs to the
    /// caller.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
