//! Eviction Order Module
//!
//! Tracks which key is displaced first when a bounded table is full.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::Serialize;

// == Eviction Policy ==
/// Which entry a full memory tier displaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Oldest insertion goes first; reads do not refresh position
    Fifo,
    /// Least recently read or written goes first
    Lru,
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" | "oldest" => Ok(EvictionPolicy::Fifo),
            "lru" => Ok(EvictionPolicy::Lru),
            other => Err(format!("unknown eviction policy: {other}")),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::Fifo => f.write_str("fifo"),
            EvictionPolicy::Lru => f.write_str("lru"),
        }
    }
}

// == Eviction Order ==
/// Ordered set of keys, oldest first.
///
/// Every touch stamps the key with a fresh sequence number, so the smallest
/// stamp is always the eviction candidate. Touch, remove and pop are
/// O(log n).
#[derive(Debug)]
pub struct EvictionOrder<K> {
    /// stamp -> key, ascending = oldest first
    by_stamp: BTreeMap<u64, K>,
    /// key -> current stamp
    stamps: HashMap<K, u64>,
    next_stamp: u64,
}

impl<K> Default for EvictionOrder<K> {
    fn default() -> Self {
        Self {
            by_stamp: BTreeMap::new(),
            stamps: HashMap::new(),
            next_stamp: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> EvictionOrder<K> {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as the newest, inserting it if unknown.
    pub fn touch(&mut self, key: &K) {
        if let Some(old) = self.stamps.get(key).copied() {
            self.by_stamp.remove(&old);
        }
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.by_stamp.insert(stamp, key.clone());
        self.stamps.insert(key.clone(), stamp);
    }

    // == Remove ==
    pub fn remove(&mut self, key: &K) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.by_stamp.remove(&stamp);
        }
    }

    // == Pop Oldest ==
    /// Removes and returns the eviction candidate.
    pub fn pop_oldest(&mut self) -> Option<K> {
        let (_, key) = self.by_stamp.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    pub fn peek_oldest(&self) -> Option<&K> {
        self.by_stamp.first_key_value().map(|(_, key)| key)
    }

    pub fn clear(&mut self) {
        self.by_stamp.clear();
        self.stamps.clear();
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.stamps.contains_key(key)
    }
}
