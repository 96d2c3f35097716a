use bon::Builder;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::types::RawMedia;
use crate::platform::Platform;

/// Maps a provider's structured response onto [`RawMedia`].
/// `None` means the response carried nothing playable.
pub type NormalizeFn = fn(&Value, Platform) -> Option<RawMedia>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Subprocess,
    Browser,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Http => "http",
            TransportKind::Subprocess => "subprocess",
            TransportKind::Browser => "browser",
        })
    }
}

/// How the page URL is handed to a scraping API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlParam {
    /// `{"url": "..."}` JSON body
    JsonBody,
    /// `?url=...` query string
    Query,
}

#[derive(Debug, Clone)]
pub struct HttpRequestShape {
    pub method: reqwest::Method,
    pub base_url: String,
    /// Path appended to `base_url`, per platform
    pub endpoints: BTreeMap<Platform, String>,
    pub headers: Vec<(String, String)>,
    pub url_param: UrlParam,
}

impl HttpRequestShape {
    pub fn endpoint_for(&self, platform: Platform) -> Option<String> {
        self.endpoints
            .get(&platform)
            .map(|path| format!("{}{}", self.base_url, path))
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorCommand {
    pub program: String,
    /// Arguments placed before the extractor flags (e.g. `-m yt_dlp`)
    pub base_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BrowserLaunch {
    /// Auto-detected when `None`
    pub executable: Option<PathBuf>,
    /// Upper bound on waiting for the page's media element
    pub media_wait: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub enum Transport {
    Http(HttpRequestShape),
    Subprocess(ExtractorCommand),
    Browser(BrowserLaunch),
}

impl Transport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Http(_) => TransportKind::Http,
            Transport::Subprocess(_) => TransportKind::Subprocess,
            Transport::Browser(_) => TransportKind::Browser,
        }
    }
}

/// Static description of one resolution provider
#[derive(Debug, Clone, Builder)]
pub struct ProviderDescriptor {
    #[builder(into)]
    pub id: String,
    #[builder(into)]
    pub display_name: String,
    pub homepage: Option<String>,
    pub platforms: Vec<Platform>,
    pub transport: Transport,
    /// Per-attempt deadline
    pub timeout: Duration,
    /// Lower runs first
    #[builder(default)]
    pub priority: u32,
    pub normalize: NormalizeFn,
}

impl ProviderDescriptor {
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            id: self.id.clone(),
            name: self.display_name.clone(),
            transport: self.transport_kind(),
            homepage: self.homepage.clone(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

/// Introspection view of a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub id: String,
    pub name: String,
    pub transport: TransportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never(_: &Value, _: Platform) -> Option<RawMedia> {
        None
    }

    fn shape() -> HttpRequestShape {
        HttpRequestShape {
            method: reqwest::Method::POST,
            base_url: "https://api.example.com".to_string(),
            endpoints: [(Platform::TikTok, "/tiktok".to_string())].into(),
            headers: vec![],
            url_param: UrlParam::JsonBody,
        }
    }

    #[test]
    fn test_endpoint_for_platform() {
        let shape = shape();
        assert_eq!(
            shape.endpoint_for(Platform::TikTok).as_deref(),
            Some("https://api.example.com/tiktok")
        );
        assert!(shape.endpoint_for(Platform::Instagram).is_none());
    }

    #[test]
    fn test_builder_and_summary() {
        let descriptor = ProviderDescriptor::builder()
            .id("example")
            .display_name("Example API")
            .platforms(vec![Platform::TikTok])
            .transport(Transport::Http(shape()))
            .timeout(Duration::from_secs(10))
            .normalize(never)
            .build();

        assert_eq!(descriptor.priority, 0);
        assert!(descriptor.supports(Platform::TikTok));
        assert!(!descriptor.supports(Platform::YouTube));

        let summary = descriptor.summary();
        assert_eq!(summary.transport, TransportKind::Http);
        assert_eq!(summary.timeout_ms, 10_000);
        assert!(summary.homepage.is_none());
    }
}
