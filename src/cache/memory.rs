//! Memory Tier Module
//!
//! The L1 contract and its in-process implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{CacheKey, CacheStats, EvictionPolicy, MemoryStore};
use crate::clock::Clock;

// == Memory Tier ==
/// Fast, bounded, TTL-expiring key/value tier.
///
/// Implementations absorb their own failures: a backend that cannot answer
/// reports a miss. All methods are safe to call concurrently.
#[async_trait]
pub trait MemoryTier: Send + Sync {
    /// Returns the value if present and unexpired.
    async fn get(&self, key: &CacheKey) -> Option<String>;

    /// Stores a value for `ttl`, displacing an entry first if the tier is full.
    async fn set(&self, key: &CacheKey, value: String, ttl: Duration);

    /// Removes entries whose TTL elapsed; returns the count.
    async fn evict_expired(&self) -> usize;

    /// Drops every entry.
    async fn clear(&self);

    /// Hit, miss, eviction and size counters.
    async fn stats(&self) -> CacheStats;

    /// Current number of entries.
    async fn size(&self) -> usize {
        self.stats().await.total_entries
    }

    /// Short name for logs and reports.
    fn backend(&self) -> &'static str;
}

// == In-Memory Tier ==
/// [`MemoryStore`] behind an async mutex.
///
/// Every operation runs under the lock, so a reader never observes a
/// half-written entry and capacity checks cannot interleave.
#[derive(Debug)]
pub struct InMemoryTier {
    store: Mutex<MemoryStore>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTier {
    pub fn new(max_entries: usize, policy: EvictionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(MemoryStore::new(max_entries, policy)),
            clock,
        }
    }
}

#[async_trait]
impl MemoryTier for InMemoryTier {
    async fn get(&self, key: &CacheKey) -> Option<String> {
        let now = self.clock.now_ms();
        self.store.lock().await.get(key, now)
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) {
        let now = self.clock.now_ms();
        let displaced = self.store.lock().await.set(key.clone(), value, now, ttl);
        if let Some(evicted) = displaced {
            debug!(evicted = evicted.short(), "memory tier at capacity, displaced oldest entry");
        }
    }

    async fn evict_expired(&self) -> usize {
        let now = self.clock.now_ms();
        self.store.lock().await.evict_expired(now)
    }

    async fn clear(&self) {
        let removed = self.store.lock().await.clear();
        debug!(removed, "memory tier cleared");
    }

    async fn stats(&self) -> CacheStats {
        self.store.lock().await.stats()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
