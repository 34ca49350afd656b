//! Cache Coordinator
//!
//! Orchestrates the memory tier (L1) and the persistent tier (L2):
//!
//! 1. `lookup` checks L1 first, then L2
//! 2. An L2 hit is copied into L1 before returning (promotion)
//! 3. A full miss touches neither tier; the caller fetches and calls `store`
//! 4. `store` writes both tiers from one TTL so they expire in lockstep
//!
//! L2 failures never reach the caller. They flip the tier health to
//! degraded and the coordinator keeps serving from L1 alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey, MemoryTier, PersistentTier, TierHealth};
use crate::clock::Clock;
use crate::error::CacheError;

// == Lookup Result ==
/// Tier that answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    L1,
    L2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit { value: String, tier: Tier },
    Miss,
}

impl Lookup {
    pub fn value(&self) -> Option<&str> {
        match self {
            Lookup::Hit { value, .. } => Some(value),
            Lookup::Miss => None,
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            Lookup::Hit { tier, .. } => Some(*tier),
            Lookup::Miss => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss)
    }
}

// == Reports ==
/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub memory_expired: usize,
    /// None when L2 is disabled or the delete failed
    pub persistent_expired: Option<usize>,
}

/// Aggregate counters exposed to health and stats endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheReport {
    pub enabled: bool,
    pub memory_backend: &'static str,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub l1_size: usize,
    pub l1_evictions: u64,
    pub l2: TierHealth,
}

#[derive(Debug, Default)]
struct Counters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
}

// == Cache Coordinator ==
pub struct CacheCoordinator {
    memory: Arc<dyn MemoryTier>,
    persistent: Option<Arc<dyn PersistentTier>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    enabled: bool,
    counters: Counters,
    /// Last observed L2 state
    l2_health: RwLock<TierHealth>,
}

impl CacheCoordinator {
    // == Constructor ==
    /// Creates a coordinator over the given tiers.
    ///
    /// `default_ttl` applies to `store` calls that do not pass their own TTL.
    pub fn new(
        memory: Arc<dyn MemoryTier>,
        persistent: Option<Arc<dyn PersistentTier>>,
        clock: Arc<dyn Clock>,
        default_ttl: Duration,
    ) -> Self {
        let l2_health = if persistent.is_some() {
            TierHealth::Healthy
        } else {
            TierHealth::Disabled
        };

        Self {
            memory,
            persistent,
            clock,
            default_ttl,
            enabled: true,
            counters: Counters::default(),
            l2_health: RwLock::new(l2_health),
        }
    }

    /// Time source shared by both tiers.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Turns the coordinator into a pass-through: every lookup misses, stores are dropped.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Starts with L2 marked degraded, e.g. when opening the store failed at boot.
    pub async fn mark_degraded(&self, error: &CacheError) {
        self.record_l2_failure("open", error).await;
    }

    // == Lookup ==
    /// Finds a value, L1 before L2, promoting L2 hits into L1.
    pub async fn lookup(&self, key: &CacheKey) -> Lookup {
        if !self.enabled {
            return Lookup::Miss;
        }

        if let Some(value) = self.memory.get(key).await {
            self.counters.l1_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = key.short(), "L1 hit");
            return Lookup::Hit {
                value,
                tier: Tier::L1,
            };
        }

        if let Some(persistent) = &self.persistent {
            let now = self.clock.now_ms();
            match persistent.get(key, now).await {
                Ok(Some(entry)) => {
                    self.record_l2_success().await;
                    self.promote(key, &entry, now).await;
                    self.counters.l2_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = key.short(), "L2 hit, promoted to L1");
                    return Lookup::Hit {
                        value: entry.value,
                        tier: Tier::L2,
                    };
                }
                Ok(None) => self.record_l2_success().await,
                Err(e) => self.record_l2_failure("get", &e).await,
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = key.short(), "cache miss");
        Lookup::Miss
    }

    /// Copies an L2 row into L1 for the rest of its lifetime only.
    async fn promote(&self, key: &CacheKey, entry: &CacheEntry, now: u64) {
        let remaining = Duration::from_millis(entry.ttl_remaining_ms(now));
        if !remaining.is_zero() {
            self.memory.set(key, entry.value.clone(), remaining).await;
        }
    }

    // == Store ==
    /// Writes a value through to both tiers.
    ///
    /// Both expiries derive from the same TTL and the same instant. An L2
    /// failure is logged and recorded; the L1 write still stands.
    pub async fn store(&self, key: &CacheKey, value: String, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = self.clock.now_ms();
        let entry = CacheEntry::new(value, now, ttl);

        self.memory.set(key, entry.value.clone(), ttl).await;

        if let Some(persistent) = &self.persistent {
            match persistent
                .set(key, entry.value, entry.created_at, entry.expires_at)
                .await
            {
                Ok(()) => self.record_l2_success().await,
                Err(e) => self.record_l2_failure("set", &e).await,
            }
        }

        debug!(key = key.short(), ttl_secs = ttl.as_secs(), "stored in cache");
    }

    /// Drops everything held in L1. L2 is untouched.
    pub async fn clear_memory(&self) {
        self.memory.clear().await;
    }

    // == Sweep ==
    /// Removes expired entries from both tiers.
    ///
    /// Called by the background sweeper. How often it runs only bounds how
    /// long dead entries occupy memory and disk; staleness is governed by the
    /// TTL checks in `lookup`, so the two intervals are set independently.
    pub async fn sweep(&self) -> SweepReport {
        let memory_expired = self.memory.evict_expired().await;

        let persistent_expired = match &self.persistent {
            Some(persistent) => match persistent.delete_expired(self.clock.now_ms()).await {
                Ok(count) => {
                    self.record_l2_success().await;
                    Some(count)
                }
                Err(e) => {
                    self.record_l2_failure("delete_expired", &e).await;
                    None
                }
            },
            None => None,
        };

        SweepReport {
            memory_expired,
            persistent_expired,
        }
    }

    // == Health ==
    /// Last observed L2 state, without probing.
    pub async fn l2_health(&self) -> TierHealth {
        self.l2_health.read().await.clone()
    }

    /// Probes L2 and records the answer.
    pub async fn probe_l2(&self) -> TierHealth {
        let Some(persistent) = &self.persistent else {
            return TierHealth::Disabled;
        };

        let health = persistent.health().await;
        match &health {
            TierHealth::Degraded { error } => {
                let err = CacheError::Unavailable(error.clone());
                self.record_l2_failure("health", &err).await;
            }
            _ => self.record_l2_success().await,
        }
        health
    }

    pub async fn report(&self) -> CacheReport {
        let l1_hits = self.counters.l1_hits.load(Ordering::Relaxed);
        let l2_hits = self.counters.l2_hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let total = l1_hits + l2_hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            (l1_hits + l2_hits) as f64 / total as f64
        };

        let memory = self.memory.stats().await;

        CacheReport {
            enabled: self.enabled,
            memory_backend: self.memory.backend(),
            l1_hits,
            l2_hits,
            misses,
            hit_rate,
            l1_size: memory.total_entries,
            l1_evictions: memory.evictions,
            l2: self.l2_health().await,
        }
    }

    async fn record_l2_success(&self) {
        // Fast path: nothing to change.
        if self.l2_health.read().await.is_healthy() {
            return;
        }
        let mut health = self.l2_health.write().await;
        if health.is_degraded() {
            info!("persistent tier recovered");
            *health = TierHealth::Healthy;
        }
    }

    async fn record_l2_failure(&self, op: &str, error: &CacheError) {
        let mut health = self.l2_health.write().await;
        if !health.is_degraded() {
            warn!(op, error = %error, "persistent tier unavailable, serving from memory only");
        } else {
            debug!(op, error = %error, "persistent tier still unavailable");
        }
        *health = TierHealth::Degraded {
            error: error.to_string(),
        };
    }
}
