//! API models for the resolution endpoints.
//!
//! - `POST /api/download` accepts a [`ResolveRequest`] and answers with a [`ResolveResponse`]
//! - `GET /api/download/apis/{platform}` answers with a [`ProvidersResponse`]
//! - `GET /api/download/test-api/{provider}` answers with a probe report
//! - `GET /api/download/proxy?url=` relays media bytes
//! - `GET /api/health` answers with a [`HealthResponse`]
//!
//! A resolve call looks like:
//!
//! ```json
//! {
//!   "url": "https://www.tiktok.com/@user/video/7300000000000000000",
//!   "preferLocalExtractor": false,
//!   "quality": "720p",
//!   "download": true
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::fetcher::DownloadedArtifact;
use crate::observability::MetricsSnapshot;
use crate::platform::Platform;
use crate::providers::{NormalizedResult, ProviderSummary};

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub url: String,
    #[serde(default)]
    pub prefer_local_extractor: bool,
    /// Overrides classification, e.g. `"youtube"`
    #[serde(default)]
    pub platform: Option<String>,
    /// `"best"` or a height such as `"720p"`
    #[serde(default)]
    pub quality: Option<String>,
    /// Persist the media locally; falls back to the server default
    #[serde(default)]
    pub download: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactView>,
}

impl ResolveResponse {
    pub fn resolved(platform: Platform, result: &NormalizedResult) -> Self {
        Self {
            success: true,
            platform: Some(platform),
            media_url: Some(result.media_url.clone()),
            title: Some(result.title.clone()),
            author: Some(result.author.clone()),
            thumbnail: Some(result.thumbnail_url.clone()),
            duration: Some(result.duration_seconds),
            provider_used: Some(result.source_provider_id.clone()),
            ..Default::default()
        }
    }

    pub fn failed(platform: Option<Platform>, kind: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            platform,
            error_kind: Some(kind.to_string()),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Keep the resolved fields but mark the request failed.
    pub fn with_failure(mut self, kind: &str, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_kind = Some(kind.to_string());
        self.error_message = Some(message.into());
        self
    }
}

/// Persisted artifact as exposed to clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactView {
    pub file_name: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl From<&DownloadedArtifact> for ArtifactView {
    fn from(artifact: &DownloadedArtifact) -> Self {
        Self {
            file_name: artifact.file_name.clone(),
            size_bytes: artifact.size_bytes,
            content_type: artifact.content_type.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersResponse {
    pub platform: Platform,
    pub providers: Vec<ProviderSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: String,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub providers: usize,
    pub metrics: MetricsSnapshot,
}
