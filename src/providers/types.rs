use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::platform::{Platform, Quality};

pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// One inbound resolution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub url: String,
    /// Skips classification when set
    pub platform: Option<Platform>,
    pub quality: Option<Quality>,
    /// Try local-extractor providers before the HTTP ones
    pub prefer_local_extractor: bool,
}

impl MediaRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            platform: None,
            quality: None,
            prefer_local_extractor: false,
        }
    }

    pub fn with_platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_quality(mut self, quality: Option<Quality>) -> Self {
        self.quality = quality;
        self
    }

    pub fn prefer_local_extractor(mut self, prefer: bool) -> Self {
        self.prefer_local_extractor = prefer;
        self
    }
}

/// What a strategy is asked to resolve
#[derive(Debug, Clone, Copy)]
pub struct AttemptTarget<'a> {
    pub url: &'a str,
    pub platform: Platform,
    pub quality: Quality,
}

/// Provider-specific fields before defaults and validation are applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMedia {
    pub media_url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// Unified success shape returned by every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    pub title: String,
    pub author: String,
    pub thumbnail_url: String,
    pub media_url: String,
    pub duration_seconds: f64,
    pub source_provider_id: String,
}

impl NormalizedResult {
    /// Apply defaults and reject results without a playable media URL.
    pub fn from_raw(
        raw: RawMedia,
        platform: Platform,
        provider_id: &str,
    ) -> Result<Self, AttemptFailure> {
        let media_url = raw
            .media_url
            .map(|url| url.trim().to_string())
            .filter(|url| is_playable_url(url))
            .ok_or_else(|| {
                AttemptFailure::new(
                    FailureKind::NoUsableMedia,
                    "response did not contain a playable media url",
                )
            })?;

        Ok(Self {
            title: non_blank(raw.title).unwrap_or_else(|| platform.default_title().to_string()),
            author: non_blank(raw.author).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            thumbnail_url: non_blank(raw.thumbnail_url).unwrap_or_default(),
            media_url,
            duration_seconds: raw
                .duration_seconds
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .unwrap_or(0.0),
            source_provider_id: provider_id.to_string(),
        })
    }

    pub fn is_usable(&self) -> bool {
        is_playable_url(&self.media_url)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A media URL counts only if it is absolute and http(s).
pub fn is_playable_url(candidate: &str) -> bool {
    match url::Url::parse(candidate.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}

/// Failure taxonomy shared by strategies and the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    UnsupportedPlatform,
    NoProviderConfigured,
    ProviderUnavailable,
    Timeout,
    NoUsableMedia,
    AllProvidersExhausted,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnsupportedPlatform => "UnsupportedPlatform",
            FailureKind::NoProviderConfigured => "NoProviderConfigured",
            FailureKind::ProviderUnavailable => "ProviderUnavailable",
            FailureKind::Timeout => "Timeout",
            FailureKind::NoUsableMedia => "NoUsableMedia",
            FailureKind::AllProvidersExhausted => "AllProvidersExhausted",
            FailureKind::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single provider attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct AttemptFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl AttemptFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ProviderUnavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn no_media(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NoUsableMedia, message)
    }
}

pub type AttemptOutcome = Result<NormalizedResult, AttemptFailure>;

/// One entry of the per-request attempt log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider_id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Terminal failure of a whole resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolutionFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Per-provider failures in attempt order
    pub attempts: Vec<AttemptRecord>,
}

impl ResolutionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: Vec::new(),
        }
    }

    pub fn exhausted(platform: Platform, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            kind: FailureKind::AllProvidersExhausted,
            message: format!(
                "Unable to resolve this {platform} video: all {} providers failed. \
                 Please try a different video or try again later.",
                attempts.len()
            ),
            attempts,
        }
    }

    /// `provider:kind` pairs, for log lines.
    pub fn attempt_summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| format!("{}:{}", a.provider_id, a.kind))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub type ResolutionOutcome = Result<NormalizedResult, ResolutionFailure>;
