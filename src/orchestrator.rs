//! Sequential multi-provider fallback
//!
//! Providers run strictly one after another in registry order. The first
//! usable result wins; every failure is recorded and the next provider tried.
//! An attempt that outlives its descriptor's timeout is dropped at the
//! deadline, which releases its connection, process or browser through the
//! strategy's own drop path.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::observability::Metrics;
use crate::platform::{Platform, classify};
use crate::providers::{
    AttemptFailure, AttemptOutcome, AttemptRecord, AttemptTarget, FailureKind, MediaRequest,
    ProviderRegistry, ResolutionFailure, ResolutionOutcome, ResolutionStrategy, TransportKind,
};

#[derive(Clone)]
pub struct FallbackOrchestrator {
    registry: Arc<ProviderRegistry>,
    metrics: Arc<Metrics>,
}

impl FallbackOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Ordered attempt list for one request.
    ///
    /// With `prefer_local_extractor`, subprocess providers move to the front;
    /// relative order inside each group is kept.
    pub fn candidates(
        &self,
        platform: Platform,
        prefer_local_extractor: bool,
    ) -> Vec<Arc<dyn ResolutionStrategy>> {
        let providers = self.registry.providers_for(platform);
        if !prefer_local_extractor {
            return providers;
        }

        let (mut local, remote): (Vec<_>, Vec<_>) = providers
            .into_iter()
            .partition(|s| s.descriptor().transport_kind() == TransportKind::Subprocess);
        local.extend(remote);
        local
    }

    pub async fn resolve(&self, request: &MediaRequest) -> ResolutionOutcome {
        self.resolve_with_cancel(request, &CancellationToken::new()).await
    }

    /// Like [`resolve`](Self::resolve), but `cancel` abandons the current
    /// attempt and skips the remaining providers.
    pub async fn resolve_with_cancel(
        &self,
        request: &MediaRequest,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome {
        let outcome = self.run(request, cancel).await;
        match &outcome {
            Ok(_) => self.metrics.resolution_succeeded(),
            Err(_) => self.metrics.resolution_failed(),
        }
        outcome
    }

    async fn run(&self, request: &MediaRequest, cancel: &CancellationToken) -> ResolutionOutcome {
        let platform = request.platform.unwrap_or_else(|| classify(&request.url));
        if !platform.is_supported() {
            debug!(url = %request.url, "Rejected unsupported platform");
            return Err(ResolutionFailure::new(
                FailureKind::UnsupportedPlatform,
                "Unsupported platform. Please provide a TikTok, Instagram, or YouTube URL.",
            ));
        }

        let candidates = self.candidates(platform, request.prefer_local_extractor);
        if candidates.is_empty() {
            warn!(%platform, "No provider configured");
            return Err(ResolutionFailure::new(
                FailureKind::NoProviderConfigured,
                format!("No provider is configured for {platform}"),
            ));
        }

        let target = AttemptTarget {
            url: &request.url,
            platform,
            quality: request.quality.unwrap_or_default(),
        };
        let mut attempts = Vec::with_capacity(candidates.len());

        for strategy in &candidates {
            if cancel.is_cancelled() {
                return Err(cancelled(attempts));
            }

            let descriptor = strategy.descriptor();
            let span = info_span!(
                "attempt",
                provider = %descriptor.id,
                transport = %descriptor.transport_kind()
            );

            self.metrics.provider_attempted();
            let started = Instant::now();
            let outcome = attempt_one(strategy.as_ref(), target, cancel)
                .instrument(span.clone())
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(mut result) => {
                    result.source_provider_id = descriptor.id.clone();
                    span.in_scope(|| info!(%platform, elapsed_ms, "Provider resolved media"));
                    return Ok(result);
                }
                Err(failure) => {
                    span.in_scope(|| {
                        warn!(kind = %failure.kind, elapsed_ms, error = %failure.message, "Provider attempt failed")
                    });
                    let was_cancelled = failure.kind == FailureKind::Cancelled;
                    if !was_cancelled {
                        self.metrics.provider_failed();
                    }
                    attempts.push(AttemptRecord {
                        provider_id: descriptor.id.clone(),
                        kind: failure.kind,
                        message: failure.message,
                    });
                    if was_cancelled {
                        return Err(cancelled(attempts));
                    }
                }
            }
        }

        let failure = ResolutionFailure::exhausted(platform, attempts);
        warn!(%platform, attempts = %failure.attempt_summary(), "All providers failed");
        Err(failure)
    }
}

fn cancelled(attempts: Vec<AttemptRecord>) -> ResolutionFailure {
    ResolutionFailure {
        kind: FailureKind::Cancelled,
        message: "Resolution cancelled by caller".to_string(),
        attempts,
    }
}

/// One bounded attempt. The strategy's future is dropped at the deadline or
/// on cancellation, whichever comes first.
async fn attempt_one(
    strategy: &dyn ResolutionStrategy,
    target: AttemptTarget<'_>,
    cancel: &CancellationToken,
) -> AttemptOutcome {
    let timeout = strategy.descriptor().timeout;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            Err(AttemptFailure::new(FailureKind::Cancelled, "attempt abandoned on cancellation"))
        }
        outcome = tokio::time::timeout(timeout, strategy.attempt(target, timeout)) => match outcome {
            Ok(Ok(result)) if result.is_usable() => Ok(result),
            Ok(Ok(_)) => Err(AttemptFailure::no_media("provider returned an unusable media url")),
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(AttemptFailure::timeout(format!(
                "no answer within {}ms",
                timeout.as_millis()
            ))),
        },
    }
}
