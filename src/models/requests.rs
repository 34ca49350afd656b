//! Request DTOs for the subtitle gateway
//!
//! Defines what callers hand to the gateway and how it is validated.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Longest accepted `video_url`.
pub const MAX_VIDEO_URL_LEN: usize = 500;

/// Longest accepted language code.
pub const MAX_LANG_LEN: usize = 20;

// Watch, short and embed URLs, or a raw 11-character id.
static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([A-Za-z0-9_-]{11})")
        .expect("Invalid video url regex")
});

static RAW_VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]{11})$").expect("Invalid video id regex")
});

/// Extracts the 11-character video id from a watch, short or embed URL, or a raw id.
pub fn extract_video_id(video_url: &str) -> Option<&str> {
    [&*VIDEO_URL, &*RAW_VIDEO_ID]
        .into_iter()
        .find_map(|re| re.captures(video_url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

// == Output Format ==
/// Representation of the subtitle payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Cues with timestamps
    #[default]
    Json,
    /// Raw WebVTT
    Vtt,
    /// Combined text without timestamps
    Text,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Vtt => "vtt",
            OutputFormat::Text => "text",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "vtt" => Ok(OutputFormat::Vtt),
            "text" => Ok(OutputFormat::Text),
            other => Err(format!("Unsupported format '{other}'. Expected json, vtt or text")),
        }
    }
}

fn default_lang() -> String {
    "en".to_string()
}

// == Subtitle Request ==
/// One subtitle extraction: which video, which language, which representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleRequest {
    /// Video URL or raw video id
    pub video_url: String,
    /// Language code
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
}

impl SubtitleRequest {
    pub fn new(video_url: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            lang: default_lang(),
            format: OutputFormat::default(),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.video_url.len() > MAX_VIDEO_URL_LEN {
            return Some(format!(
                "video_url exceeds maximum length of {MAX_VIDEO_URL_LEN} characters"
            ));
        }
        if extract_video_id(&self.video_url).is_none() {
            return Some(
                "Invalid YouTube URL. Expected format: https://www.youtube.com/watch?v=VIDEO_ID"
                    .to_string(),
            );
        }
        if self.lang.is_empty() || self.lang.len() > MAX_LANG_LEN {
            return Some("Language code must be 1 to 20 characters".to_string());
        }
        if !self
            .lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Some("Language code may only contain letters, digits, '-' and '_'".to_string());
        }
        None
    }

    /// Video id the request resolves to, if the URL is valid.
    pub fn video_id(&self) -> Option<&str> {
        extract_video_id(&self.video_url)
    }
}

// == Batch Request ==
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub videos: Vec<SubtitleRequest>,
}
