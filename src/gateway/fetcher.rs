//! Upstream fetch collaborator
//!
//! The gateway never talks to the subtitle source directly. Whatever does
//! (a yt-dlp wrapper, an HTTP client, a test double) implements this trait
//! and classifies its own failures as [`FetchError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::models::OutputFormat;

/// One subtitle track available for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// ISO 639-1 language code
    pub code: String,
    pub name: String,
    /// Whether the track is machine generated
    pub auto_generated: bool,
    #[serde(default)]
    pub formats: Vec<String>,
}

#[async_trait]
pub trait SubtitleFetcher: Send + Sync {
    /// Fetches the rendered subtitle payload for one video, language and format.
    async fn fetch(
        &self,
        video_url: &str,
        lang: &str,
        format: OutputFormat,
    ) -> Result<String, FetchError>;

    /// Lists the subtitle tracks a video offers.
    async fn list_languages(&self, video_url: &str) -> Result<Vec<LanguageInfo>, FetchError>;
}
