//! HTTP scraping-API strategy

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::descriptor::{HttpRequestShape, ProviderDescriptor, Transport, UrlParam};
use super::traits::{ProbeReport, ResolutionStrategy, normalize_response};
use super::types::{AttemptFailure, AttemptOutcome, AttemptTarget};

/// Resolves through a third-party API described by an HTTP descriptor
pub struct HttpStrategy {
    descriptor: Arc<ProviderDescriptor>,
    client: Client,
}

impl HttpStrategy {
    /// `client` is shared across providers; it must not carry a global
    /// timeout shorter than any descriptor's.
    pub fn new(descriptor: Arc<ProviderDescriptor>, client: Client) -> Self {
        Self { descriptor, client }
    }

    fn shape(&self) -> Result<&HttpRequestShape, AttemptFailure> {
        match &self.descriptor.transport {
            Transport::Http(shape) => Ok(shape),
            other => Err(AttemptFailure::unavailable(format!(
                "provider {} is not an http provider ({})",
                self.descriptor.id,
                other.kind()
            ))),
        }
    }

    fn build_request(
        &self,
        shape: &HttpRequestShape,
        endpoint: &str,
        page_url: &str,
        timeout: Duration,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(shape.method.clone(), endpoint)
            .timeout(timeout);

        for (name, value) in &shape.headers {
            request = request.header(name, value);
        }

        match shape.url_param {
            UrlParam::JsonBody => request.json(&serde_json::json!({ "url": page_url })),
            UrlParam::Query => request.query(&[("url", page_url)]),
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> AttemptFailure {
    if err.is_timeout() {
        AttemptFailure::timeout(format!("request timed out: {err}"))
    } else if err.is_decode() {
        AttemptFailure::no_media(format!("unreadable response body: {err}"))
    } else {
        AttemptFailure::unavailable(format!("request failed: {err}"))
    }
}

#[async_trait]
impl ResolutionStrategy for HttpStrategy {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn attempt(&self, target: AttemptTarget<'_>, timeout: Duration) -> AttemptOutcome {
        let shape = self.shape()?;
        let endpoint = shape.endpoint_for(target.platform).ok_or_else(|| {
            AttemptFailure::unavailable(format!(
                "{} has no endpoint for {}",
                self.descriptor.display_name, target.platform
            ))
        })?;

        debug!(provider = %self.descriptor.id, %endpoint, "Sending provider request");

        let response = self
            .build_request(shape, &endpoint, target.url, timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let bytes = response.bytes().await.map_err(map_transport_error)?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AttemptFailure::no_media(format!("response was not JSON: {e}")))?;

        normalize_response(&self.descriptor, &body, target)
    }

    async fn probe(&self, timeout: Duration) -> ProbeReport {
        let started = Instant::now();
        let provider = self.descriptor.id.clone();

        let (reachable, detail) = match self.shape() {
            Err(failure) => (false, failure.message),
            Ok(shape) => {
                let mut request = self.client.get(&shape.base_url).timeout(timeout);
                for (name, value) in &shape.headers {
                    request = request.header(name, value);
                }

                // A 4xx still proves the endpoint is up; a 5xx does not.
                match request.send().await {
                    Ok(response) => {
                        let status = response.status();
                        (!status.is_server_error(), format!("HTTP {}", status.as_u16()))
                    }
                    Err(err) => (false, map_transport_error(err).message),
                }
            }
        };

        ProbeReport {
            provider,
            reachable,
            detail,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}
