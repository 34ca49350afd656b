//! Request and Response models for the subtitle gateway
//!
//! DTOs shared by the gateway facade and the ops endpoints.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{extract_video_id, BatchRequest, OutputFormat, SubtitleRequest};
pub use responses::{
    BatchResponseItem, HealthResponse, RateLimitStatus, Resolved, Source, StatsResponse,
};
