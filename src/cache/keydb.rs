//! KeyDB Memory Tier
//!
//! Network-backed L1 sharing the [`MemoryTier`] contract, for deployments
//! where several gateway processes should see the same hot set.
//!
//! Every entry is a `PX`-expiring string under the tier's namespace. A
//! sorted set (`<namespace>__order`) indexes the live members with a
//! sequence stamp, which gives the tier its size, its eviction order and
//! the set of keys `clear` removes. Each mutation runs as one Lua script so
//! the value and its index entry never diverge.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use fred::clients::Pool;
use fred::interfaces::{ClientLike, LuaInterface, SortedSetsInterface};
use fred::types::config::{Config as FredConfig, ReconnectPolicy};
use fred::types::Builder;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, EvictionPolicy, MemoryTier};
use crate::clock::duration_ms;

/// Default namespace for every key this tier writes.
const KEY_PREFIX: &str = "subtitle:";

const POOL_SIZE: usize = 4;

// == Scripts ==
// KEYS: value, order set, sequence. ARGV: member, policy.
const GET_SCRIPT: &str = r#"
    local value = redis.call('GET', KEYS[1])
    if value and ARGV[2] == 'lru' then
        local seq = redis.call('INCR', KEYS[3])
        redis.call('ZADD', KEYS[2], 'XX', seq, ARGV[1])
    end
    return value
"#;

// KEYS: value, order set, sequence. ARGV: member, payload, ttl ms, max entries, namespace.
// Returns the number of live entries displaced.
const SET_SCRIPT: &str = r#"
    local displaced = 0
    if not redis.call('ZSCORE', KEYS[2], ARGV[1]) then
        local limit = tonumber(ARGV[4])
        while redis.call('ZCARD', KEYS[2]) >= limit do
            local oldest = redis.call('ZPOPMIN', KEYS[2])
            if #oldest == 0 then break end
            displaced = displaced + redis.call('DEL', ARGV[5] .. oldest[1])
        end
    end
    local seq = redis.call('INCR', KEYS[3])
    redis.call('ZADD', KEYS[2], seq, ARGV[1])
    redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
    return displaced
"#;

// KEYS: order set. ARGV: namespace. Drops index members whose value expired.
const PRUNE_SCRIPT: &str = r#"
    local removed = 0
    for _, member in ipairs(redis.call('ZRANGE', KEYS[1], 0, -1)) do
        if redis.call('EXISTS', ARGV[1] .. member) == 0 then
            redis.call('ZREM', KEYS[1], member)
            removed = removed + 1
        end
    end
    return removed
"#;

// KEYS: order set, sequence. ARGV: namespace. Returns the values deleted.
const CLEAR_SCRIPT: &str = r#"
    local removed = 0
    for _, member in ipairs(redis.call('ZRANGE', KEYS[1], 0, -1)) do
        removed = removed + redis.call('DEL', ARGV[1] .. member)
    end
    redis.call('DEL', KEYS[1], KEYS[2])
    return removed
"#;

pub struct KeyDbTier {
    pool: Pool,
    namespace: String,
    max_entries: usize,
    policy: EvictionPolicy,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

impl KeyDbTier {
    /// Connects to `url` (`redis://` or `rediss://`) and verifies it with a PING.
    pub async fn connect(
        url: &str,
        max_entries: usize,
        policy: EvictionPolicy,
    ) -> anyhow::Result<Self> {
        let config = FredConfig::from_url(url).context("invalid REDIS_URL")?;

        let mut builder = Builder::from_config(config);
        // Exponential reconnect: initial 0ms, base 100ms, max 30s, factor 2.
        builder.set_policy(ReconnectPolicy::new_exponential(0, 100, 30_000, 2));

        let pool = builder
            .build_pool(POOL_SIZE)
            .context("failed to build KeyDB connection pool")?;
        pool.init().await.context("failed to connect to KeyDB")?;

        let _: String = pool
            .ping(None)
            .await
            .context("KeyDB PING failed after connect")?;

        info!(pool_size = POOL_SIZE, max_entries, %policy, "KeyDB memory tier connected");

        Ok(Self {
            pool,
            namespace: KEY_PREFIX.to_string(),
            max_entries: max_entries.max(1),
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        })
    }

    /// Writes under `namespace` instead of `subtitle:`, so several tiers can
    /// share one database.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn value_key(&self, key: &CacheKey) -> String {
        format!("{}{key}", self.namespace)
    }

    fn order_key(&self) -> String {
        format!("{}__order", self.namespace)
    }

    fn seq_key(&self) -> String {
        format!("{}__seq", self.namespace)
    }

    async fn indexed_entries(&self) -> usize {
        match self.pool.zcard::<i64, _>(self.order_key()).await {
            Ok(count) => usize::try_from(count).unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "KeyDB ZCARD failed");
                0
            }
        }
    }
}

#[async_trait]
impl MemoryTier for KeyDbTier {
    async fn get(&self, key: &CacheKey) -> Option<String> {
        let value: Option<String> = match self
            .pool
            .eval(
                GET_SCRIPT,
                vec![self.value_key(key), self.order_key(), self.seq_key()],
                vec![key.as_str().to_string(), self.policy.to_string()],
            )
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key.short(), error = %e, "KeyDB GET failed, treating as miss");
                None
            }
        };

        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) {
        let ttl_ms = duration_ms(ttl).clamp(1, i64::MAX as u64);
        let result: Result<i64, _> = self
            .pool
            .eval(
                SET_SCRIPT,
                vec![self.value_key(key), self.order_key(), self.seq_key()],
                vec![
                    key.as_str().to_string(),
                    value,
                    ttl_ms.to_string(),
                    self.max_entries.to_string(),
                    self.namespace.clone(),
                ],
            )
            .await;

        match result {
            Ok(0) => {}
            Ok(displaced) => {
                self.evictions
                    .fetch_add(u64::try_from(displaced).unwrap_or(0), Ordering::Relaxed);
                debug!(displaced, "KeyDB tier at capacity, displaced oldest entries");
            }
            Err(e) => warn!(key = key.short(), error = %e, "KeyDB SET failed"),
        }
    }

    /// Values expire on the server; this drops their stale index members.
    async fn evict_expired(&self) -> usize {
        let result: Result<i64, _> = self
            .pool
            .eval(PRUNE_SCRIPT, vec![self.order_key()], vec![self.namespace.clone()])
            .await;

        match result {
            Ok(removed) => {
                let removed = usize::try_from(removed).unwrap_or(0);
                self.expired.fetch_add(removed as u64, Ordering::Relaxed);
                removed
            }
            Err(e) => {
                warn!(error = %e, "KeyDB expiry prune failed");
                0
            }
        }
    }

    async fn clear(&self) {
        let result: Result<i64, _> = self
            .pool
            .eval(
                CLEAR_SCRIPT,
                vec![self.order_key(), self.seq_key()],
                vec![self.namespace.clone()],
            )
            .await;

        match result {
            Ok(removed) => debug!(removed, "KeyDB memory tier cleared"),
            Err(e) => warn!(error = %e, "KeyDB clear failed"),
        }
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            total_entries: self.indexed_entries().await,
        }
    }

    fn backend(&self) -> &'static str {
        "keydb"
    }
}
