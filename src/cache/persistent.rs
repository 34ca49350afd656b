//! Persistent Tier Module
//!
//! The L2 contract: durable key/value rows with an explicit expiry column.

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::{CacheEntry, CacheKey};
use crate::error::Result;

// == Tier Health ==
/// Reachability of a cache tier as seen by its last operation or probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TierHealth {
    Healthy,
    /// Last operation failed; the coordinator is serving from L1 only
    Degraded { error: String },
    /// No persistent tier configured
    Disabled,
}

impl TierHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, TierHealth::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, TierHealth::Degraded { .. })
    }
}

// == Persistent Tier ==
/// Durable store surviving process restarts.
///
/// Writes are upserts on the key. Rows past `expires_at` are invisible to
/// `get` even before `delete_expired` physically removes them.
#[async_trait]
pub trait PersistentTier: Send + Sync {
    /// Returns the row when it exists with `expires_at > now_ms`.
    async fn get(&self, key: &CacheKey, now_ms: u64) -> Result<Option<CacheEntry>>;

    /// Inserts or replaces the row for `key`.
    async fn set(&self, key: &CacheKey, value: String, created_at: u64, expires_at: u64)
        -> Result<()>;

    /// Deletes every row with `expires_at <= now_ms` in a single statement.
    async fn delete_expired(&self, now_ms: u64) -> Result<usize>;

    /// Probes the store.
    async fn health(&self) -> TierHealth;

    /// Short name for logs and reports.
    fn backend(&self) -> &'static str;
}
