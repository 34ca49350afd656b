//! SQLite Persistent Tier
//!
//! One table keyed by the derived cache key. Every call runs on the blocking
//! pool so the async workers never wait on disk.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info};

use crate::cache::{CacheEntry, CacheKey, PersistentTier, TierHealth};
use crate::error::{CacheError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS subtitle_cache (
    cache_key  TEXT PRIMARY KEY,
    payload    TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subtitle_cache_expires
    ON subtitle_cache(expires_at);
"#;

/// SQLite-backed [`PersistentTier`].
#[derive(Clone)]
pub struct SqliteTier {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTier {
    /// Opens (or creates) the database file and its schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::Unavailable(format!("Failed to create database directory: {e}"))
            })?;
        }

        let conn = Connection::open(path)?;
        // WAL keeps readers off the writer's lock.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %path.display(), "persistent tier opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates a private in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of physical rows, expired or not.
    pub async fn row_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM subtitle_cache", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| CacheError::Internal("Lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| CacheError::Internal(format!("Blocking task failed: {e}")))?
    }
}

/// SQLite integers are signed; timestamps past i64::MAX are clamped.
fn to_sql_ts(ts: u64) -> i64 {
    i64::try_from(ts).unwrap_or(i64::MAX)
}

fn from_sql_ts(ts: i64) -> u64 {
    u64::try_from(ts).unwrap_or(0)
}

#[async_trait]
impl PersistentTier for SqliteTier {
    async fn get(&self, key: &CacheKey, now_ms: u64) -> Result<Option<CacheEntry>> {
        let key = key.as_str().to_owned();
        self.with_conn(move |conn| {
            let entry = conn
                .query_row(
                    "SELECT payload, created_at, expires_at FROM subtitle_cache
                     WHERE cache_key = ?1 AND expires_at > ?2",
                    params![key, to_sql_ts(now_ms)],
                    |row| {
                        Ok(CacheEntry {
                            value: row.get(0)?,
                            created_at: from_sql_ts(row.get(1)?),
                            expires_at: from_sql_ts(row.get(2)?),
                        })
                    },
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: String,
        created_at: u64,
        expires_at: u64,
    ) -> Result<()> {
        let key = key.as_str().to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO subtitle_cache (cache_key, payload, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(cache_key) DO UPDATE SET
                    payload = excluded.payload,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at",
                params![key, value, to_sql_ts(created_at), to_sql_ts(expires_at)],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_expired(&self, now_ms: u64) -> Result<usize> {
        let deleted = self
            .with_conn(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM subtitle_cache WHERE expires_at <= ?1",
                    params![to_sql_ts(now_ms)],
                )?;
                Ok(deleted)
            })
            .await?;

        if deleted > 0 {
            debug!(deleted, "persistent tier removed expired rows");
        }
        Ok(deleted)
    }

    async fn health(&self) -> TierHealth {
        let probe = self
            .with_conn(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await;

        match probe {
            Ok(()) => TierHealth::Healthy,
            Err(e) => {
                error!(error = %e, "persistent tier health check failed");
                TierHealth::Degraded {
                    error: e.to_string(),
                }
            }
        }
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
