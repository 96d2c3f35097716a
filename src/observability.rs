//! Tracing setup and in-process counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    resolutions_succeeded: AtomicU64,
    resolutions_failed: AtomicU64,
    provider_attempts: AtomicU64,
    provider_failures: AtomicU64,
    artifacts_written: AtomicU64,
    bytes_written: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolution_succeeded(&self) {
        self.resolutions_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "resolutions_succeeded", "Metric incremented");
    }

    pub fn resolution_failed(&self) {
        self.resolutions_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "resolutions_failed", "Metric incremented");
    }

    pub fn provider_attempted(&self) {
        self.provider_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn provider_failed(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn artifact_written(&self, bytes: u64) {
        self.artifacts_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        tracing::debug!(counter = "artifacts_written", bytes, "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolutions_succeeded: self.resolutions_succeeded.load(Ordering::Relaxed),
            resolutions_failed: self.resolutions_failed.load(Ordering::Relaxed),
            provider_attempts: self.provider_attempts.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            artifacts_written: self.artifacts_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub resolutions_succeeded: u64,
    pub resolutions_failed: u64,
    pub provider_attempts: u64,
    pub provider_failures: u64,
    pub artifacts_written: u64,
    pub bytes_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.resolution_succeeded();
        metrics.provider_attempted();
        metrics.provider_attempted();
        metrics.provider_failed();
        metrics.artifact_written(1024);
        metrics.artifact_written(10);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.resolutions_succeeded, 1);
        assert_eq!(snapshot.resolutions_failed, 0);
        assert_eq!(snapshot.provider_attempts, 2);
        assert_eq!(snapshot.provider_failures, 1);
        assert_eq!(snapshot.artifacts_written, 2);
        assert_eq!(snapshot.bytes_written, 1034);
    }
}
