//! Cache Module
//!
//! Two-tier subtitle cache: a bounded memory tier (L1) in front of a durable
//! persistent tier (L2), orchestrated by [`CacheCoordinator`].

mod coordinator;
mod entry;
mod eviction;
mod key;
mod memory;
mod persistent;
mod sqlite;
mod stats;
mod store;

#[cfg(feature = "keydb")]
mod keydb;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use coordinator::{CacheCoordinator, CacheReport, Lookup, SweepReport, Tier};
pub use entry::CacheEntry;
pub use eviction::{EvictionOrder, EvictionPolicy};
pub use key::CacheKey;
pub use memory::{InMemoryTier, MemoryTier};
pub use persistent::{PersistentTier, TierHealth};
pub use sqlite::SqliteTier;
pub use stats::CacheStats;
pub use store::MemoryStore;

#[cfg(feature = "keydb")]
pub use keydb::KeyDbTier;
