//! Memory Store Module
//!
//! Bounded map combining TTL expiry with a capacity-driven eviction order.
//! Not synchronized; [`InMemoryTier`](super::InMemoryTier) wraps it in a lock.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheKey, CacheStats, EvictionOrder, EvictionPolicy};

// == Memory Store ==
#[derive(Debug)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<CacheKey, CacheEntry>,
    /// Eviction candidates, oldest first
    order: EvictionOrder<CacheKey>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed, at least 1
    max_entries: usize,
    policy: EvictionPolicy,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` entries (clamped to at least one).
    pub fn new(max_entries: usize, policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            order: EvictionOrder::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            policy,
        }
    }

    // == Set ==
    /// Stores a value that expires `ttl` after `now_ms`.
    ///
    /// Overwriting an existing key replaces value and expiry and never evicts.
    /// Inserting a new key into a full store first displaces exactly one entry.
    /// Returns the displaced key, if any.
    pub fn set(
        &mut self,
        key: CacheKey,
        value: String,
        now_ms: u64,
        ttl: Duration,
    ) -> Option<CacheKey> {
        let is_overwrite = self.entries.contains_key(&key);
        let mut displaced = None;

        if !is_overwrite && self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.order.pop_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
                displaced = Some(evicted);
            }
        }

        self.entries
            .insert(key.clone(), CacheEntry::new(value, now_ms, ttl));

        // A rewrite counts as a fresh insertion under both policies.
        self.order.touch(&key);
        self.stats.set_total_entries(self.entries.len());

        displaced
    }

    // == Get ==
    /// Returns the value if present and not expired at `now_ms`.
    ///
    /// Expired entries are removed on the spot and counted as misses.
    pub fn get(&mut self, key: &CacheKey, now_ms: u64) -> Option<String> {
        let Some(entry) = self.entries.get(key) else {
            self.stats.record_miss();
            return None;
        };

        if entry.is_expired_at(now_ms) {
            self.entries.remove(key);
            self.order.remove(key);
            self.stats.record_expired(1);
            self.stats.record_miss();
            self.stats.set_total_entries(self.entries.len());
            return None;
        }

        let value = entry.value.clone();
        self.stats.record_hit();
        if self.policy == EvictionPolicy::Lru {
            self.order.touch(key);
        }
        Some(value)
    }

    /// Returns the stored entry without touching counters or eviction order.
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Remove ==
    pub fn remove(&mut self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Evict Expired ==
    /// Removes every entry expired at `now_ms`, returning how many went.
    pub fn evict_expired(&mut self, now_ms: u64) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.order.remove(key);
        }

        self.stats.record_expired(expired.len());
        self.stats.set_total_entries(self.entries.len());
        expired.len()
    }

    /// Drops every entry; counters are kept.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        self.stats.set_total_entries(0);
        count
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn key(n: &str) -> CacheKey {
        CacheKey::derive(n, "en", "json")
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = MemoryStore::new(100, EvictionPolicy::Fifo);

        store.set(key("v1"), "value1".to_string(), 0, TTL);

        assert_eq!(store.get(&key("v1"), 0), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = MemoryStore::new(100, EvictionPolicy::Fifo);
        assert_eq!(store.get(&key("nope"), 0), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_overwrite_replaces_value_and_expiry() {
        let mut store = MemoryStore::new(100, EvictionPolicy::Fifo);

        store.set(key("v1"), "value1".to_string(), 0, Duration::from_secs(1));
        store.set(key("v1"), "value2".to_string(), 500, Duration::from_secs(10));

        assert_eq!(store.len(), 1);
        assert_eq!(store.peek(&key("v1")).map(|e| e.expires_at), Some(10_500));
        assert_eq!(store.get(&key("v1"), 5_000), Some("value2".to_string()));
    }

    #[test]
    fn test_store_lazy_expiry_on_read() {
        let mut store = MemoryStore::new(100, EvictionPolicy::Fifo);

        store.set(key("v1"), "value1".to_string(), 0, Duration::from_secs(2));

        assert!(store.get(&key("v1"), 1_000).is_some());
        assert!(store.get(&key("v1"), 3_000).is_none());
        assert!(store.is_empty(), "expired entry should be dropped on read");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expired, 1);
    }

    #[test]
    fn test_store_fifo_eviction_ignores_reads() {
        let mut store = MemoryStore::new(3, EvictionPolicy::Fifo);

        store.set(key("k1"), "1".to_string(), 0, TTL);
        store.set(key("k2"), "2".to_string(), 0, TTL);
        store.set(key("k3"), "3".to_string(), 0, TTL);

        // Reading k1 does not save it under FIFO.
        store.get(&key("k1"), 0);
        let displaced = store.set(key("k4"), "4".to_string(), 0, TTL);

        assert_eq!(displaced, Some(key("k1")));
        assert_eq!(store.len(), 3);
        assert!(store.get(&key("k1"), 0).is_none());
        assert!(store.get(&key("k4"), 0).is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_eviction_refreshes_on_read() {
        let mut store = MemoryStore::new(3, EvictionPolicy::Lru);

        store.set(key("k1"), "1".to_string(), 0, TTL);
        store.set(key("k2"), "2".to_string(), 0, TTL);
        store.set(key("k3"), "3".to_string(), 0, TTL);

        store.get(&key("k1"), 0);
        let displaced = store.set(key("k4"), "4".to_string(), 0, TTL);

        assert_eq!(displaced, Some(key("k2")));
        assert!(store.get(&key("k1"), 0).is_some());
    }

    #[test]
    fn test_store_overwrite_at_capacity_does_not_evict() {
        let mut store = MemoryStore::new(2, EvictionPolicy::Fifo);

        store.set(key("k1"), "1".to_string(), 0, TTL);
        store.set(key("k2"), "2".to_string(), 0, TTL);
        let displaced = store.set(key("k1"), "1b".to_string(), 0, TTL);

        assert_eq!(displaced, None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_store_zero_capacity_is_clamped() {
        let mut store = MemoryStore::new(0, EvictionPolicy::Fifo);
        assert_eq!(store.capacity(), 1);

        store.set(key("k1"), "1".to_string(), 0, TTL);
        store.set(key("k2"), "2".to_string(), 0, TTL);
        assert_eq!(store.len(), 1);
        assert!(store.get(&key("k2"), 0).is_some());
    }

    #[test]
    fn test_store_evict_expired() {
        let mut store = MemoryStore::new(100, EvictionPolicy::Fifo);

        store.set(key("short"), "s".to_string(), 0, Duration::from_secs(1));
        store.set(key("long"), "l".to_string(), 0, Duration::from_secs(10));

        assert_eq!(store.evict_expired(500), 0);
        assert_eq!(store.evict_expired(1_100), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&key("long"), 1_100).is_some());
    }

    #[test]
    fn test_store_remove_and_clear() {
        let mut store = MemoryStore::new(100, EvictionPolicy::Fifo);

        store.set(key("a"), "a".to_string(), 0, TTL);
        store.set(key("b"), "b".to_string(), 0, TTL);

        assert!(store.remove(&key("a")));
        assert!(!store.remove(&key("a")));
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
        assert_eq!(store.stats().total_entries, 0);
    }
}
