//! Subtitle Gateway
//!
//! Request flow in front of the upstream subtitle source:
//!
//! 1. Admit the client for the endpoint class
//! 2. Validate the request
//! 3. Look the payload up in the cache tiers
//! 4. On a miss, fetch upstream under the request timeout and store the result
//!
//! Batches are admitted once as a whole, then every item runs steps 2-4 on
//! the batch dispatcher.
//!
//! Language listings skip the payload tiers and are reused per video id
//! from a small TTL store.

mod fetcher;

pub use fetcher::{LanguageInfo, SubtitleFetcher};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::batch::{BatchDispatcher, BatchItemResult};
use crate::cache::{CacheCoordinator, CacheKey, EvictionPolicy, InMemoryTier, Lookup, MemoryTier};
use crate::config::Config;
use crate::error::{FetchError, ServiceError};
use crate::limiter::{EndpointClass, RateLimiter};
use crate::models::{
    extract_video_id, HealthResponse, RateLimitStatus, Resolved, Source, StatsResponse,
    SubtitleRequest,
};

/// Longest identity fragment written to logs.
const MAX_LOG_LEN: usize = 100;

/// Makes caller-supplied text safe for a single log line.
///
/// Line breaks and tabs are escaped, other control characters dropped,
/// and the result is cut to 100 characters.
pub fn sanitize_for_log(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_LOG_LEN));
    for c in input.chars().take(MAX_LOG_LEN) {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

// == Resolver ==
/// Cache-then-fetch for one validated request. Shared with batch workers.
struct Resolver {
    coordinator: Arc<CacheCoordinator>,
    fetcher: Arc<dyn SubtitleFetcher>,
    request_timeout: Duration,
}

impl Resolver {
    async fn resolve(&self, request: SubtitleRequest) -> Result<Resolved, ServiceError> {
        if let Some(reason) = request.validate() {
            warn!(video_url = %sanitize_for_log(&request.video_url), %reason, "invalid request");
            return Err(ServiceError::InvalidRequest(reason));
        }
        let video_id = request
            .video_id()
            .map(str::to_owned)
            .ok_or_else(|| ServiceError::InvalidRequest("Invalid YouTube URL".into()))?;

        let key = CacheKey::derive(&video_id, &request.lang, request.format.as_str());

        if let Lookup::Hit { value, tier } = self.coordinator.lookup(&key).await {
            debug!(video_id = %video_id, key = key.short(), ?tier, "served from cache");
            return Ok(Resolved {
                video_id,
                payload: value,
                source: tier.into(),
            });
        }

        let payload = self.fetch(&request).await?;
        self.coordinator.store(&key, payload.clone(), None).await;

        info!(video_id = %video_id, lang = %sanitize_for_log(&request.lang), format = %request.format, "fetched from upstream");
        Ok(Resolved {
            video_id,
            payload,
            source: Source::Upstream,
        })
    }

    async fn fetch(&self, request: &SubtitleRequest) -> Result<String, ServiceError> {
        let fetch = self
            .fetcher
            .fetch(&request.video_url, &request.lang, request.format);

        match tokio::time::timeout(self.request_timeout, fetch).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(err)) => {
                log_upstream_failure(&request.video_url, &err);
                Err(err.into())
            }
            Err(_) => {
                warn!(
                    video_url = %sanitize_for_log(&request.video_url),
                    timeout_secs = self.request_timeout.as_secs(),
                    "upstream fetch timed out"
                );
                Err(ServiceError::Timeout(self.request_timeout))
            }
        }
    }
}

fn log_upstream_failure(video_url: &str, err: &FetchError) {
    let video_url = sanitize_for_log(video_url);
    if err.is_transient() {
        warn!(%video_url, error = %err, "upstream fetch failed");
    } else {
        info!(%video_url, error = %err, "upstream fetch rejected");
    }
}

// == Language Cache ==
/// Language lists per video id, reused for `ttl`. A zero TTL disables it.
struct LanguageCache {
    tier: InMemoryTier,
    ttl: Duration,
}

impl LanguageCache {
    async fn get(&self, key: &CacheKey) -> Option<Vec<LanguageInfo>> {
        if self.ttl.is_zero() {
            return None;
        }
        let raw = self.tier.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(languages) => Some(languages),
            Err(e) => {
                warn!(video_id = key.short(), error = %e, "unreadable cached language list");
                None
            }
        }
    }

    async fn put(&self, key: &CacheKey, languages: &[LanguageInfo]) {
        if self.ttl.is_zero() {
            return;
        }
        match serde_json::to_string(languages) {
            Ok(raw) => self.tier.set(key, raw, self.ttl).await,
            Err(e) => warn!(video_id = key.short(), error = %e, "language list not cached"),
        }
    }
}

// == Subtitle Gateway ==
pub struct SubtitleGateway {
    resolver: Arc<Resolver>,
    languages: LanguageCache,
    limiter: Arc<RateLimiter>,
    dispatcher: BatchDispatcher,
    batch_max_items: usize,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl SubtitleGateway {
    /// Wires the gateway over already-built components.
    ///
    /// Reads `request_timeout`, `batch_workers`, `batch_max_items` and
    /// `language_cache_ttl` from `config`.
    pub fn new(
        coordinator: Arc<CacheCoordinator>,
        limiter: Arc<RateLimiter>,
        fetcher: Arc<dyn SubtitleFetcher>,
        config: &Config,
    ) -> Self {
        let languages = LanguageCache {
            tier: InMemoryTier::new(
                config.cache_max_entries,
                EvictionPolicy::Fifo,
                coordinator.clock(),
            ),
            ttl: config.language_cache_ttl(),
        };
        let resolver = Resolver {
            coordinator,
            fetcher,
            request_timeout: config.request_timeout(),
        };

        Self {
            resolver: Arc::new(resolver),
            languages,
            limiter,
            dispatcher: BatchDispatcher::new(config.batch_workers),
            batch_max_items: config.batch_max_items,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    async fn admit(&self, client: &str, class: EndpointClass) -> Result<(), ServiceError> {
        if self.limiter.admit(client, class).await {
            Ok(())
        } else {
            let config = self.limiter.config();
            Err(ServiceError::RateLimited {
                limit: config.limit_for(class),
                window_secs: config.window.as_secs(),
            })
        }
    }

    // == Fetch One ==
    /// Resolves one request for `client`, from cache when possible.
    pub async fn fetch_one(
        &self,
        client: &str,
        request: SubtitleRequest,
    ) -> Result<Resolved, ServiceError> {
        self.admit(client, EndpointClass::Subtitles).await?;
        self.resolver.resolve(request).await
    }

    // == Fetch Batch ==
    /// Resolves every request of a batch; one admission covers the whole batch.
    ///
    /// Item failures, including invalid items, are reported in their slot.
    pub async fn fetch_batch(
        &self,
        client: &str,
        requests: Vec<SubtitleRequest>,
    ) -> Result<Vec<BatchItemResult<Resolved>>, ServiceError> {
        if requests.len() > self.batch_max_items {
            return Err(ServiceError::InvalidRequest(format!(
                "Batch of {} exceeds maximum of {} videos",
                requests.len(),
                self.batch_max_items
            )));
        }
        self.admit(client, EndpointClass::Batch).await?;

        let resolver = Arc::clone(&self.resolver);
        let results = self
            .dispatcher
            .run(requests, move |request| {
                let resolver = Arc::clone(&resolver);
                async move { resolver.resolve(request).await }
            })
            .await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(items = results.len(), failed, "batch completed");
        Ok(results)
    }

    // == List Languages ==
    /// Lists available subtitle tracks, reusing a video's list until it expires.
    ///
    /// Every call is admitted, cache hit or not.
    pub async fn list_languages(
        &self,
        client: &str,
        video_url: &str,
    ) -> Result<Vec<LanguageInfo>, ServiceError> {
        self.admit(client, EndpointClass::Languages).await?;

        let Some(video_id) = extract_video_id(video_url) else {
            warn!(video_url = %sanitize_for_log(video_url), "invalid url for language listing");
            return Err(ServiceError::InvalidRequest(
                "Invalid YouTube URL. Expected format: https://www.youtube.com/watch?v=VIDEO_ID".into(),
            ));
        };

        let key = CacheKey::from_raw(video_id);
        if let Some(languages) = self.languages.get(&key).await {
            debug!(video_id, "language list cache hit");
            return Ok(languages);
        }

        info!(video_id, "fetching language list");
        let timeout = self.resolver.request_timeout;
        match tokio::time::timeout(timeout, self.resolver.fetcher.list_languages(video_url)).await {
            Ok(Ok(languages)) => {
                self.languages.put(&key, &languages).await;
                Ok(languages)
            }
            Ok(Err(err)) => {
                log_upstream_failure(video_url, &err);
                Err(err.into())
            }
            Err(_) => Err(ServiceError::Timeout(timeout)),
        }
    }

    // == Reports ==
    /// Probes L2, then reports cache, limiter and uptime.
    pub async fn health(&self) -> HealthResponse {
        self.resolver.coordinator.probe_l2().await;
        let cache = self.resolver.coordinator.report().await;
        let rate_limiting = RateLimitStatus {
            settings: self.limiter.config().clone(),
            tracked_windows: self.limiter.stats().await.tracked_windows,
        };

        HealthResponse::new(
            self.started_at,
            self.started.elapsed().as_secs(),
            cache,
            rate_limiting,
        )
    }

    pub async fn stats(&self) -> StatsResponse {
        StatsResponse {
            cache: self.resolver.coordinator.report().await,
            language_cache: self.languages.tier.stats().await,
            rate_limiter: self.limiter.stats().await,
            batch_workers: self.dispatcher.worker_limit(),
            batch_max_items: self.batch_max_items,
        }
    }
}
