use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::fetcher::MediaFetcher;
use crate::observability::Metrics;
use crate::orchestrator::FallbackOrchestrator;
use crate::providers::ProviderRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: FallbackOrchestrator,
    pub fetcher: Arc<MediaFetcher>,
    pub metrics: Arc<Metrics>,
    /// Bounds concurrent resolutions; each one may hold a browser or a subprocess
    pub resolution_slots: Arc<Semaphore>,
    /// Cancelled on graceful shutdown to abandon in-flight attempts
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, registry: ProviderRegistry, fetcher: MediaFetcher) -> Self {
        let metrics = Arc::new(Metrics::new());
        let slots = config.server.concurrency_limit.max(1);

        Self {
            orchestrator: FallbackOrchestrator::new(Arc::new(registry))
                .with_metrics(metrics.clone()),
            fetcher: Arc::new(fetcher.with_metrics(metrics.clone())),
            resolution_slots: Arc::new(Semaphore::new(slots)),
            shutdown: CancellationToken::new(),
            config: Arc::new(config),
            metrics,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.orchestrator.registry()
    }
}
