//! Subtitle Gateway - caching, admission control and batch dispatch
//!
//! Sits in front of a slow, rate-limited subtitle source: a two-tier cache
//! (memory + SQLite) answers repeats, a sliding-window limiter meters
//! clients, and a bounded dispatcher fans batches out.

pub mod api;
pub mod batch;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use gateway::{SubtitleFetcher, SubtitleGateway};
pub use tasks::spawn_sweeper;
