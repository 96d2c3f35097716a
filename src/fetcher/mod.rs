//! Media fetcher: turns a resolved media URL into bytes
//!
//! Two modes:
//! - [`MediaFetcher::persist`] streams to `<download_dir>/<name>.part`, then
//!   renames into place once the byte count is known to be non-zero
//! - [`MediaFetcher::open_stream`] hands the upstream body to the caller,
//!   refusing non-public hosts and non-media content types
//!
//! Downloads use their own client with a long whole-transfer deadline,
//! separate from provider timeouts.

mod naming;
mod relay;

pub use naming::{artifact_stem, extension_for, sanitize_title};
pub use relay::{is_media_content_type, is_public_ip};

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::{ExtractorConfig, FetcherConfig};
use crate::observability::Metrics;
use crate::platform::{Platform, Quality};
use crate::providers::extractor::{run_extractor, save_args, stderr_excerpt};
use crate::providers::{ExtractorCommand, NormalizedResult};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Download timed out")]
    Timeout,

    #[error("Downloaded file is empty")]
    EmptyArtifact,

    #[error("Artifact exceeds limit of {limit} bytes")]
    ArtifactTooLarge { limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extractor download failed: {0}")]
    Extractor(String),

    #[error("Refusing to relay from non-public host {0}")]
    ForbiddenHost(String),

    #[error("Upstream did not return media (content type: {0})")]
    NotMedia(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Http(_) => "Http",
            FetchError::Timeout => "Timeout",
            FetchError::EmptyArtifact => "EmptyArtifact",
            FetchError::ArtifactTooLarge { .. } => "ArtifactTooLarge",
            FetchError::Io(_) => "Io",
            FetchError::Extractor(_) => "Extractor",
            FetchError::ForbiddenHost(_) => "ForbiddenHost",
            FetchError::NotMedia(_) => "NotMedia",
        }
    }

    /// Remote-side failures the local extractor may still work around
    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FetchError::Http(_) | FetchError::Timeout | FetchError::EmptyArtifact
        )
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

fn map_request_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(err.to_string())
    }
}

/// A media file written to local storage
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip)]
    pub source: NormalizedResult,
}

/// Upstream media body for pass-through relaying
pub struct MediaStream {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub stream: BoxStream<'static, reqwest::Result<Bytes>>,
}

/// Headers that make the request look like a browser playing the video.
pub fn browser_headers(platform: Platform) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("video/mp4,video/*,*/*;q=0.9"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("video"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("no-cors"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("cross-site"));
    if let Some(referer) = platform.referer() {
        headers.insert(header::REFERER, HeaderValue::from_static(referer));
    }
    headers
}

pub struct MediaFetcher {
    client: Client,
    download_dir: PathBuf,
    max_artifact_bytes: u64,
    download_timeout: Duration,
    relay_private_hosts: bool,
    extractor: Option<ExtractorCommand>,
    metrics: Arc<Metrics>,
}

impl MediaFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let download_timeout = config.download_timeout.as_duration();
        let client = Client::builder()
            .connect_timeout(config.connect_timeout.as_duration())
            .timeout(download_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self {
            client,
            download_dir: config.download_dir.clone(),
            max_artifact_bytes: config.max_artifact_bytes.as_u64(),
            download_timeout,
            relay_private_hosts: config.relay_private_hosts,
            extractor: None,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Fetcher with the extractor save fallback wired in when both sides allow it
    pub fn from_config(fetcher: &FetcherConfig, extractor: &ExtractorConfig) -> Result<Self> {
        let mut media_fetcher = Self::new(fetcher)?;
        if fetcher.extractor_fallback && extractor.enabled {
            media_fetcher.extractor = Some(ExtractorCommand {
                program: extractor.program.clone(),
                base_args: extractor.args.clone(),
            });
        }
        Ok(media_fetcher)
    }

    pub fn with_extractor(mut self, command: Option<ExtractorCommand>) -> Self {
        self.extractor = command;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    async fn get(&self, media_url: &str, platform: Platform) -> Result<Response> {
        let response = self
            .client
            .get(media_url)
            .headers(browser_headers(platform))
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(response)
    }

    /// Relay mode: nothing is written locally.
    pub async fn open_stream(&self, media_url: &str, platform: Platform) -> Result<MediaStream> {
        if !self.relay_private_hosts {
            relay::ensure_public_host(media_url).await?;
        }

        let response = self.get(media_url, platform).await?;
        let content_type = content_type_of(&response);
        if !is_media_content_type(content_type.as_deref()) {
            warn!(media_url, ?content_type, "Refusing to relay non-media response");
            return Err(FetchError::NotMedia(
                content_type.unwrap_or_else(|| "none".to_string()),
            ));
        }
        let content_length = response.content_length();

        debug!(media_url, ?content_type, ?content_length, "Relaying media stream");

        Ok(MediaStream {
            content_type,
            content_length,
            stream: response.bytes_stream().boxed(),
        })
    }

    /// Download `source.media_url` into the download directory.
    ///
    /// Falls back to the local extractor saving `page_url` directly when the
    /// HTTP transfer fails for a remote reason.
    pub async fn persist(
        &self,
        source: &NormalizedResult,
        page_url: &str,
        platform: Platform,
        quality: Quality,
    ) -> Result<DownloadedArtifact> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let stem = artifact_stem(platform, &source.title);

        let streamed = self.stream_to_disk(&source.media_url, platform, &stem).await;
        let (path, size_bytes, content_type) = match (streamed, &self.extractor) {
            (Ok(written), _) => written,
            (Err(err), Some(command)) if err.is_recoverable() => {
                warn!(error = %err, page_url, "Media download failed, trying extractor save");
                let (path, size) = self.save_with_extractor(command, page_url, quality, &stem).await?;
                (path, size, None)
            }
            (Err(err), _) => return Err(err),
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.metrics.artifact_written(size_bytes);
        info!(file = %file_name, size_bytes, provider = %source.source_provider_id, "Artifact written");

        Ok(DownloadedArtifact {
            path,
            file_name,
            size_bytes,
            content_type,
            source: source.clone(),
        })
    }

    async fn stream_to_disk(
        &self,
        media_url: &str,
        platform: Platform,
        stem: &str,
    ) -> Result<(PathBuf, u64, Option<String>)> {
        let response = self.get(media_url, platform).await?;

        if let Some(length) = response.content_length() {
            if length > self.max_artifact_bytes {
                return Err(FetchError::ArtifactTooLarge {
                    limit: self.max_artifact_bytes,
                });
            }
        }

        let content_type = content_type_of(&response);
        let extension = extension_for(content_type.as_deref(), media_url);
        let final_path = self.download_dir.join(format!("{stem}.{extension}"));
        let part_path = self.download_dir.join(format!("{stem}.{extension}.part"));

        let written = match self.write_body(response, &part_path).await {
            Ok(0) => Err(FetchError::EmptyArtifact),
            other => other,
        };

        let size = match written {
            Ok(size) => size,
            Err(err) => {
                if let Err(e) = tokio::fs::remove_file(&part_path).await {
                    debug!(error = %e, path = %part_path.display(), "Partial file cleanup skipped");
                }
                return Err(err);
            }
        };

        tokio::fs::rename(&part_path, &final_path).await?;
        Ok((final_path, size, content_type))
    }

    async fn write_body(&self, response: Response, part_path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(part_path).await?;
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(map_request_error)?;
            written += chunk.len() as u64;
            if written > self.max_artifact_bytes {
                return Err(FetchError::ArtifactTooLarge {
                    limit: self.max_artifact_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        Ok(written)
    }

    async fn save_with_extractor(
        &self,
        command: &ExtractorCommand,
        page_url: &str,
        quality: Quality,
        stem: &str,
    ) -> Result<(PathBuf, u64)> {
        let output = self.download_dir.join(format!("{stem}.mp4"));
        let args = save_args(page_url, quality, &output);

        let run = run_extractor(command, &args, self.download_timeout)
            .await
            .map_err(|failure| FetchError::Extractor(failure.message))?;
        if !run.status.success() {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(FetchError::Extractor(stderr_excerpt(&run.stderr)));
        }

        let size = match tokio::fs::metadata(&output).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::Extractor("extractor produced no file".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if size == 0 || size > self.max_artifact_bytes {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(if size == 0 {
                FetchError::EmptyArtifact
            } else {
                FetchError::ArtifactTooLarge {
                    limit: self.max_artifact_bytes,
                }
            });
        }

        Ok((output, size))
    }
}

fn content_type_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
