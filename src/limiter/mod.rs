//! Rate Limiter Module
//!
//! Per-client sliding-window admission control with independent ceilings
//! per endpoint class.
//!
//! The whole client table sits behind one async mutex, so `admit` is atomic
//! per client: two concurrent calls can never both take the last slot. The
//! table is capacity-bounded; under pressure the least recently active
//! window is dropped, which forgives that client's history. That makes the
//! limiter advisory against a flood of distinct identities rather than a
//! hard security boundary.

mod window;

pub use window::ClientWindow;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::EvictionOrder;
use crate::clock::{duration_ms, Clock};
use crate::config::Config;

// == Endpoint Class ==
/// Named category of requests sharing one ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    /// Single subtitle extraction
    Subtitles,
    /// Language listing
    Languages,
    /// Batch submission; one call stands for several extractions
    Batch,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Subtitles => "subtitles",
            EndpointClass::Languages => "languages",
            EndpointClass::Batch => "batch",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Limiter Config ==
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Trailing window length
    #[serde(serialize_with = "serialize_secs")]
    pub window: Duration,
    /// Ceiling for `Subtitles` and `Languages`
    pub per_window: u32,
    /// Ceiling for `Batch`
    pub batch_per_window: u32,
    /// Client windows kept before the least recently active is dropped
    pub max_tracked_clients: usize,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

impl RateLimitConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.rate_limit_enabled,
            window: config.rate_limit_window(),
            per_window: config.rate_limit_per_minute,
            batch_per_window: config.batch_rate_limit(),
            max_tracked_clients: config.max_tracked_clients,
        }
    }

    /// Ceiling that applies to `class`.
    pub fn limit_for(&self, class: EndpointClass) -> u32 {
        match class {
            EndpointClass::Subtitles | EndpointClass::Languages => self.per_window,
            EndpointClass::Batch => self.batch_per_window,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// == Limiter Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub tracked_windows: usize,
    pub admitted: u64,
    pub denied: u64,
    /// Windows dropped to stay within `max_tracked_clients`
    pub displaced: u64,
    /// Idle windows reclaimed by `purge_stale`
    pub purged: u64,
}

type WindowKey = (String, EndpointClass);

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<WindowKey, ClientWindow>,
    /// Least recently active first
    activity: EvictionOrder<WindowKey>,
    stats: LimiterStats,
}

// == Rate Limiter ==
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    // == Admit ==
    /// Admits and records the request iff the client is below the class ceiling
    /// within the trailing window.
    pub async fn admit(&self, client: &str, class: EndpointClass) -> bool {
        if !self.config.enabled {
            return true;
        }

        let ceiling = self.config.limit_for(class);
        let window_ms = duration_ms(self.config.window);
        let key: WindowKey = (client.to_owned(), class);

        let mut state = self.state.lock().await;
        let now = self.clock.now_ms();

        let allowed = state
            .windows
            .entry(key.clone())
            .or_default()
            .try_record(now, window_ms, ceiling);
        state.activity.touch(&key);

        if allowed {
            state.stats.admitted += 1;
        } else {
            state.stats.denied += 1;
            info!(client, class = %class, ceiling, "rate limit exceeded");
        }

        let cap = self.config.max_tracked_clients.max(1);
        while state.windows.len() > cap {
            let Some(oldest) = state.activity.pop_oldest() else {
                break;
            };
            state.windows.remove(&oldest);
            state.stats.displaced += 1;
            debug!(client = %oldest.0, class = %oldest.1, "client window displaced");
        }

        allowed
    }

    /// Requests still available to `client` in `class` right now. Does not record.
    pub async fn remaining(&self, client: &str, class: EndpointClass) -> u32 {
        let ceiling = self.config.limit_for(class);
        if !self.config.enabled {
            return ceiling;
        }

        let window_ms = duration_ms(self.config.window);
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        match state.windows.get_mut(&(client.to_owned(), class)) {
            Some(window) => {
                window.prune(now, window_ms);
                ceiling.saturating_sub(window.len() as u32)
            }
            None => ceiling,
        }
    }

    // == Purge Stale ==
    /// Drops windows with no request inside the trailing window; returns the count.
    ///
    /// Such windows carry no information, so purging them never changes an
    /// admission decision.
    pub async fn purge_stale(&self) -> usize {
        let window_ms = duration_ms(self.config.window);
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        let stale: Vec<WindowKey> = state
            .windows
            .iter_mut()
            .filter_map(|(key, window)| {
                window.prune(now, window_ms);
                window.is_empty().then(|| key.clone())
            })
            .collect();

        for key in &stale {
            state.windows.remove(key);
            state.activity.remove(key);
        }
        state.stats.purged += stale.len() as u64;

        stale.len()
    }

    pub async fn stats(&self) -> LimiterStats {
        let state = self.state.lock().await;
        LimiterStats {
            tracked_windows: state.windows.len(),
            ..state.stats.clone()
        }
    }
}
