//! Dedup ledger implementations.
//!
//! - `MemoryLedger` / `MemoryPromotionStore` - testing and development
//! - `SqliteLedger` - persistent, feature = "sqlite"

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{MemoryLedger, MemoryPromotionStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;
