//! Configuration Module
//!
//! Handles loading and managing gateway configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionPolicy;

/// Which implementation backs the memory tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryBackend {
    /// Bounded map inside this process
    InProcess,
    /// Shared KeyDB / Redis instance at the given URL
    KeyDb(String),
}

/// Gateway configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Master switch for both cache tiers
    pub cache_enabled: bool,
    /// TTL in seconds applied to stored subtitle payloads
    pub cache_ttl: u64,
    /// Maximum number of entries the memory tier can hold
    pub cache_max_entries: usize,
    /// Which entry the memory tier displaces when full
    pub eviction_policy: EvictionPolicy,
    /// Seconds between background sweeps
    pub sweep_interval: u64,
    /// SQLite file for the persistent tier, None disables it
    pub database_path: Option<PathBuf>,
    /// Memory tier implementation
    pub memory_backend: MemoryBackend,
    /// Admission control switch
    pub rate_limit_enabled: bool,
    /// Ceiling for single-item endpoints per window
    pub rate_limit_per_minute: u32,
    /// Batch ceiling = per-minute ceiling × multiplier
    pub batch_rate_multiplier: u32,
    /// Sliding window length in seconds
    pub rate_limit_window: u64,
    /// Maximum number of client windows retained
    pub max_tracked_clients: usize,
    /// Concurrently running items per batch
    pub batch_workers: usize,
    /// Largest accepted batch
    pub batch_max_items: usize,
    /// Upper bound on one upstream fetch, in seconds
    pub request_timeout: u64,
    /// Seconds a video's language list is reused, 0 disables
    pub language_cache_ttl: u64,
    /// Port for the ops endpoints
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ENABLED` - Enable both cache tiers (default: true)
    /// - `CACHE_TTL` - Payload TTL in seconds (default: 3600)
    /// - `CACHE_MAXSIZE` - Maximum memory tier entries (default: 1000)
    /// - `CACHE_EVICTION` - `fifo` or `lru` (default: fifo)
    /// - `CACHE_POLL_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `DATABASE_PATH` - SQLite file, empty disables (default: database.db)
    /// - `REDIS_URL` - Use a KeyDB/Redis memory tier (default: unset)
    /// - `RATE_LIMIT_ENABLED` - Enable admission control (default: true)
    /// - `RATE_LIMIT_PER_MINUTE` - Single-item ceiling (default: 10)
    /// - `RATE_LIMIT_BATCH_MULTIPLIER` - Batch ceiling multiplier (default: 3)
    /// - `RATE_LIMIT_WINDOW` - Window length in seconds (default: 60)
    /// - `RATE_LIMIT_MAX_CLIENTS` - Tracked client cap (default: 10000)
    /// - `BATCH_WORKERS` - Batch concurrency ceiling (default: 4)
    /// - `BATCH_MAX_ITEMS` - Maximum batch size (default: 10)
    /// - `REQUEST_TIMEOUT` - Upstream fetch timeout in seconds (default: 120)
    /// - `LANGUAGE_CACHE_TTL` - Language list reuse in seconds (default: 300)
    /// - `SERVER_PORT` - Ops HTTP port (default: 8000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let database_path = match env::var("DATABASE_PATH") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => defaults.database_path,
        };

        let memory_backend = match env::var("REDIS_URL") {
            Ok(url) if !url.trim().is_empty() => MemoryBackend::KeyDb(url),
            _ => MemoryBackend::InProcess,
        };

        Self {
            cache_enabled: env_or("CACHE_ENABLED", defaults.cache_enabled),
            cache_ttl: env_or("CACHE_TTL", defaults.cache_ttl),
            cache_max_entries: env_or("CACHE_MAXSIZE", defaults.cache_max_entries),
            eviction_policy: env_or("CACHE_EVICTION", defaults.eviction_policy),
            sweep_interval: env_or("CACHE_POLL_INTERVAL", defaults.sweep_interval),
            database_path,
            memory_backend,
            rate_limit_enabled: env_or("RATE_LIMIT_ENABLED", defaults.rate_limit_enabled),
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute),
            batch_rate_multiplier: env_or(
                "RATE_LIMIT_BATCH_MULTIPLIER",
                defaults.batch_rate_multiplier,
            ),
            rate_limit_window: env_or("RATE_LIMIT_WINDOW", defaults.rate_limit_window),
            max_tracked_clients: env_or("RATE_LIMIT_MAX_CLIENTS", defaults.max_tracked_clients),
            batch_workers: env_or("BATCH_WORKERS", defaults.batch_workers),
            batch_max_items: env_or("BATCH_MAX_ITEMS", defaults.batch_max_items),
            request_timeout: env_or("REQUEST_TIMEOUT", defaults.request_timeout),
            language_cache_ttl: env_or("LANGUAGE_CACHE_TTL", defaults.language_cache_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero interval would spin the sweeper.
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn rate_limit_window(&self) -> Duration {
        // A zero window would forget every request and never deny.
        Duration::from_secs(self.rate_limit_window.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn language_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.language_cache_ttl)
    }

    /// Ceiling for the batch endpoint class.
    pub fn batch_rate_limit(&self) -> u32 {
        self.rate_limit_per_minute
            .saturating_mul(self.batch_rate_multiplier)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: 3600,
            cache_max_entries: 1000,
            eviction_policy: EvictionPolicy::Fifo,
            sweep_interval: 60,
            database_path: Some(PathBuf::from("database.db")),
            memory_backend: MemoryBackend::InProcess,
            rate_limit_enabled: true,
            rate_limit_per_minute: 10,
            batch_rate_multiplier: 3,
            rate_limit_window: 60,
            max_tracked_clients: 10_000,
            batch_workers: 4,
            batch_max_items: 10,
            request_timeout: 120,
            language_cache_ttl: 300,
            server_port: 8000,
        }
    }
}

/// Reads and parses an environment variable, falling back on absence or parse failure.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
