//! API Routes
//!
//! Configures the Axum router for the ops endpoints.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, stats_handler, AppState};

/// Creates the ops router.
///
/// # Endpoints
/// - `GET /health` - Status, uptime, cache and rate limiting summary
/// - `GET /stats` - Cache and rate limiter counters
///
/// # Middleware
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
