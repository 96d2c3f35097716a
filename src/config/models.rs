use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// End-to-end budget for one resolution; provider timeouts must fit inside it
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Resolutions allowed to run at once; further resolve calls wait for a slot
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout: default_request_timeout(),
            max_payload_bytes: default_max_payload_bytes(),
            cors_origins: default_cors_origins(),
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(180)
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(64 * 1024) // 64 KB
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn default_concurrency_limit() -> usize {
    64
}

/// Resolution provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    /// Per-attempt timeout for scraping APIs
    #[serde(default = "default_http_timeout")]
    pub http_timeout: HumanDuration,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: HumanDuration,
    /// Request identity sent to scraping APIs
    #[serde(default = "default_api_user_agent")]
    pub user_agent: String,
    /// Provider ids left out of the catalog
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default = "default_rapidapi_host")]
    pub rapidapi_host: String,
    /// Loaded from environment only
    #[serde(skip)]
    pub rapidapi_key: Option<String>,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            http_timeout: default_http_timeout(),
            probe_timeout: default_probe_timeout(),
            user_agent: default_api_user_agent(),
            disabled: Vec::new(),
            rapidapi_host: default_rapidapi_host(),
            rapidapi_key: None,
            extractor: ExtractorConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.iter().any(|disabled| disabled == id)
    }
}

fn default_http_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_probe_timeout() -> HumanDuration {
    HumanDuration::from_secs(5)
}

fn default_api_user_agent() -> String {
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1"
        .to_string()
}

fn default_rapidapi_host() -> String {
    "tiktok-video-no-watermark2.p.rapidapi.com".to_string()
}

/// Local extractor (yt-dlp) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_extractor_program")]
    pub program: String,
    /// Arguments placed before the extractor flags, e.g. `["-m", "yt_dlp"]`
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_extractor_timeout")]
    pub timeout: HumanDuration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_extractor_program(),
            args: Vec::new(),
            timeout: default_extractor_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_extractor_program() -> String {
    "yt-dlp".to_string()
}

fn default_extractor_timeout() -> HumanDuration {
    HumanDuration::from_secs(60)
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Auto-detected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_browser_timeout")]
    pub timeout: HumanDuration,
    /// Longest wait for the page's media element
    #[serde(default = "default_media_wait")]
    pub media_wait: HumanDuration,
    #[serde(default = "default_desktop_user_agent")]
    pub user_agent: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            executable: None,
            timeout: default_browser_timeout(),
            media_wait: default_media_wait(),
            user_agent: default_desktop_user_agent(),
        }
    }
}

fn default_browser_timeout() -> HumanDuration {
    HumanDuration::from_secs(45)
}

fn default_media_wait() -> HumanDuration {
    HumanDuration::from_secs(15)
}

fn default_desktop_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

/// Media download configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Whole-transfer deadline, separate from provider timeouts
    #[serde(default = "default_download_timeout")]
    pub download_timeout: HumanDuration,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: ByteSize,
    /// Persist resolved media when the request does not say
    #[serde(default)]
    pub persist_by_default: bool,
    /// Let the local extractor save the page when streaming fails
    #[serde(default = "default_true")]
    pub extractor_fallback: bool,
    #[serde(default = "default_desktop_user_agent")]
    pub user_agent: String,
    /// Let the relay endpoint reach loopback and private-network hosts
    #[serde(default)]
    pub relay_private_hosts: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            download_timeout: default_download_timeout(),
            connect_timeout: default_connect_timeout(),
            max_artifact_bytes: default_max_artifact_bytes(),
            persist_by_default: false,
            extractor_fallback: true,
            user_agent: default_desktop_user_agent(),
            relay_private_hosts: false,
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_download_timeout() -> HumanDuration {
    HumanDuration::from_secs(120)
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_max_artifact_bytes() -> ByteSize {
    ByteSize(500 * 1024 * 1024) // 500 MB
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info,reelgrab=debug".to_string()
}
