//! Convenient imports for Ratchet.
//!
//! ```ignore
//! use ratchet::prelude::*;
//!
//! let ratchet = Ratchet::in_memory()?;
//! ratchet.counters.update_counter("hits", 1)?;
//! ```

// Main entry point
pub use crate::database::{Ratchet, RatchetBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Outcomes
pub use crate::types::{ListOutcome, PurchaseOutcome, StatsSummary, StatsUpdate, TxnOutcome};

// Configuration and time
pub use crate::types::{Clock, ManualClock, RatchetConfig, SystemClock};

// Store
pub use crate::types::{MemoryStore, Store};
