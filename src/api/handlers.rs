//! API Handlers
//!
//! HTTP handlers for the ops endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::gateway::SubtitleGateway;
use crate::models::{HealthResponse, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<SubtitleGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<SubtitleGateway>) -> Self {
        Self { gateway }
    }
}

/// Handler for GET /stats
///
/// Returns cache and rate limiter counters.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.gateway.stats().await)
}

/// Handler for GET /health
///
/// Probes the persistent tier and reports overall status. A degraded
/// persistent tier still answers 200 since requests keep being served.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.gateway.health().await)
}
