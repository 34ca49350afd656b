//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use subtitle_gateway::cache::{
    CacheCoordinator, EvictionPolicy, InMemoryTier, PersistentTier, SqliteTier,
};
use subtitle_gateway::clock::{Clock, ManualClock};
use subtitle_gateway::config::Config;
use subtitle_gateway::error::FetchError;
use subtitle_gateway::gateway::{LanguageInfo, SubtitleFetcher, SubtitleGateway};
use subtitle_gateway::limiter::{RateLimitConfig, RateLimiter};
use subtitle_gateway::models::OutputFormat;

/// Upstream double: answers from a script keyed by video URL, otherwise
/// echoes the request. Every call can be delayed by a fixed latency.
#[derive(Default)]
pub struct ScriptedFetcher {
    failures: Mutex<HashMap<String, FetchError>>,
    latency: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, video_url: &str, error: FetchError) {
        self.failures
            .lock()
            .unwrap()
            .insert(video_url.to_string(), error);
    }

    pub fn delay(&self, video_url: &str, latency: Duration) {
        self.latency
            .lock()
            .unwrap()
            .insert(video_url.to_string(), latency);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payload_for(video_url: &str, lang: &str, format: OutputFormat) -> String {
        format!("subs:{video_url}:{lang}:{format}")
    }
}

#[async_trait]
impl SubtitleFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        video_url: &str,
        lang: &str,
        format: OutputFormat,
    ) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency.lock().unwrap().get(video_url).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failures.lock().unwrap().get(video_url).cloned();
        match failure {
            Some(err) => Err(err),
            None => Ok(Self::payload_for(video_url, lang, format)),
        }
    }

    async fn list_languages(&self, video_url: &str) -> Result<Vec<LanguageInfo>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failure = self.failures.lock().unwrap().get(video_url).cloned();
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(vec![LanguageInfo {
            code: "en".into(),
            name: "English".into(),
            auto_generated: false,
            formats: vec!["vtt".into()],
        }])
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub persistent: Option<SqliteTier>,
    pub coordinator: Arc<CacheCoordinator>,
    pub limiter: Arc<RateLimiter>,
    pub gateway: Arc<SubtitleGateway>,
}

/// Defaults with a generous rate limit so only limiter tests hit it.
pub fn test_config() -> Config {
    Config {
        database_path: None,
        rate_limit_per_minute: 1_000,
        ..Config::default()
    }
}

pub fn harness(config: Config) -> Harness {
    harness_with_l2(config, SqliteTier::in_memory().ok())
}

pub fn harness_with_l2(config: Config, persistent: Option<SqliteTier>) -> Harness {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let fetcher = ScriptedFetcher::new();

    let memory = Arc::new(InMemoryTier::new(
        config.cache_max_entries,
        EvictionPolicy::Fifo,
        dyn_clock.clone(),
    ));
    let l2 = persistent
        .clone()
        .map(|tier| Arc::new(tier) as Arc<dyn PersistentTier>);
    let coordinator = Arc::new(
        CacheCoordinator::new(memory, l2, dyn_clock.clone(), config.cache_ttl())
            .with_enabled(config.cache_enabled),
    );
    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::from_config(&config),
        dyn_clock,
    ));
    let gateway = Arc::new(SubtitleGateway::new(
        coordinator.clone(),
        limiter.clone(),
        fetcher.clone(),
        &config,
    ));

    Harness {
        clock,
        fetcher,
        persistent,
        coordinator,
        limiter,
        gateway,
    }
}
