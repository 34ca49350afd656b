//! Error types for the subtitle gateway
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Longest error message carried in a batch slot.
pub const MAX_ITEM_ERROR_LEN: usize = 200;

// == Cache Error Enum ==
/// Failure of a cache tier.
///
/// Never surfaces to callers of the coordinator: it is absorbed there and
/// reported through the tier health instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Tier cannot be reached at all
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Persistent store rejected the operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Worker thread or lock failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}

// == Fetch Error Enum ==
/// Classified failure of the upstream fetch collaborator.
///
/// The gateway passes these through unchanged; it never retries them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Upstream answered with its own rate limit (HTTP 429 upstream)
    #[error("Upstream rate limited: {0}")]
    RateLimited(String),

    /// Video or subtitle track does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network hiccup worth retrying later
    #[error("Transient upstream failure: {0}")]
    Transient(String),

    /// Anything else
    #[error("Upstream failure: {0}")]
    Failed(String),
}

impl FetchError {
    /// True for failures that may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::RateLimited(_) | FetchError::Transient(_))
    }
}

// == Item Failure ==
/// Classification carried by a failed batch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UpstreamRateLimited,
    NotFound,
    UpstreamTransient,
    UpstreamFailed,
    InvalidRequest,
    Timeout,
    Panicked,
    Cancelled,
}

/// Error descriptor for one batch item. Always data, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind:?}: {message}")]
pub struct ItemFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    /// Creates a failure, truncating the message to [`MAX_ITEM_ERROR_LEN`] characters.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message: String = message.into();
        let message = if message.chars().count() > MAX_ITEM_ERROR_LEN {
            message.chars().take(MAX_ITEM_ERROR_LEN).collect()
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("timed out after {}ms", after.as_millis()),
        )
    }
}

impl From<FetchError> for ItemFailure {
    fn from(err: FetchError) -> Self {
        let kind = match &err {
            FetchError::RateLimited(_) => FailureKind::UpstreamRateLimited,
            FetchError::NotFound(_) => FailureKind::NotFound,
            FetchError::Transient(_) => FailureKind::UpstreamTransient,
            FetchError::Failed(_) => FailureKind::UpstreamFailed,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<ServiceError> for ItemFailure {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Upstream(fetch) => fetch.into(),
            ServiceError::Timeout(after) => Self::timeout(after),
            ServiceError::InvalidRequest(msg) => Self::new(FailureKind::InvalidRequest, msg),
            // Items are never re-admitted, but keep the mapping total.
            other @ ServiceError::RateLimited { .. } => {
                Self::new(FailureKind::UpstreamRateLimited, other.to_string())
            }
        }
    }
}

// == Service Error Enum ==
/// Outcome of the request-flow facade that callers map onto responses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Admission denied for this client and endpoint class
    #[error("Rate limit exceeded. Maximum {limit} requests per {window_secs}s.")]
    RateLimited { limit: u32, window_secs: u64 },

    /// Request rejected before any work was done
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Classified upstream failure, passed through
    #[error(transparent)]
    Upstream(#[from] FetchError),

    /// Upstream fetch exceeded the caller-supplied timeout
    #[error("Upstream fetch timed out after {}ms", .0.as_millis())]
    Timeout(std::time::Duration),
}

// == IntoResponse Implementation ==
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServiceError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded"),
            ServiceError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ServiceError::Upstream(FetchError::RateLimited(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_rate_limited")
            }
            ServiceError::Upstream(FetchError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ServiceError::Upstream(FetchError::Transient(_)) => {
                (StatusCode::BAD_GATEWAY, "upstream_unavailable")
            }
            ServiceError::Upstream(FetchError::Failed(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "extraction_failed")
            }
            ServiceError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        };

        let body = Json(json!({
            "error": code,
            "detail": self.to_string(),
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache tier operations.
pub type Result<T> = std::result::Result<T, CacheError>;
