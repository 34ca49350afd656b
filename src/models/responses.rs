//! Response DTOs for the subtitle gateway
//!
//! Defines the structure of what the gateway reports back: resolved
//! payloads, batch slots, health and stats.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::batch::BatchItemResult;
use crate::cache::{CacheReport, CacheStats, Tier};
use crate::error::ItemFailure;
use crate::limiter::{LimiterStats, RateLimitConfig};
use crate::models::SubtitleRequest;

/// Service name reported by health checks.
pub const SERVICE_NAME: &str = "subtitle-gateway";

// == Resolved ==
/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    L1,
    L2,
    Upstream,
}

impl From<Tier> for Source {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::L1 => Source::L1,
            Tier::L2 => Source::L2,
        }
    }
}

/// A subtitle payload together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub video_id: String,
    pub payload: String,
    pub source: Source,
}

// == Batch Response Item ==
/// One slot of a batch answer, shaped for the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponseItem {
    pub video_url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemFailure>,
}

impl BatchResponseItem {
    /// Pairs a batch result with the request it answers.
    pub fn new(request: &SubtitleRequest, result: BatchItemResult<Resolved>) -> Self {
        match result.outcome {
            Ok(resolved) => Self {
                video_url: request.video_url.clone(),
                success: true,
                video_id: Some(resolved.video_id),
                source: Some(resolved.source),
                data: Some(resolved.payload),
                error: None,
            },
            Err(failure) => Self {
                video_url: request.video_url.clone(),
                success: false,
                video_id: None,
                source: None,
                data: None,
                error: Some(failure),
            },
        }
    }
}

// == Health Response ==
/// Rate limiting section of the health report.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    #[serde(flatten)]
    pub settings: RateLimitConfig,
    pub tracked_windows: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" when the persistent tier is failing
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub cache: CacheReport,
    pub rate_limiting: RateLimitStatus,
}

impl HealthResponse {
    pub fn new(
        started_at: DateTime<Utc>,
        uptime_seconds: u64,
        cache: CacheReport,
        rate_limiting: RateLimitStatus,
    ) -> Self {
        let status = if cache.l2.is_degraded() {
            "degraded"
        } else {
            "healthy"
        };

        Self {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now().to_rfc3339(),
            started_at,
            uptime_seconds,
            cache,
            rate_limiting,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

// == Stats Response ==
/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheReport,
    /// Per-video language list reuse
    pub language_cache: CacheStats,
    pub rate_limiter: LimiterStats,
    pub batch_workers: usize,
    pub batch_max_items: usize,
}
