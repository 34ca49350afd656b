//! API Module
//!
//! HTTP handlers and routing for the ops endpoints.
//!
//! # Endpoints
//! - `GET /health` - Health check with cache and rate limiting summary
//! - `GET /stats` - Cache and rate limiter counters

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
