use std::net::SocketAddr;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{info, warn};

use super::{
    services::{health, list_providers, probe_provider, proxy_media, resolve_media},
    state::AppState,
};
use crate::config::Config;
use crate::fetcher::MediaFetcher;
use crate::providers::ProviderRegistry;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HTTP routes over an already assembled state
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/api/download", post(resolve_media))
        .route("/api/download/apis/{platform}", get(list_providers))
        .route("/api/download/test-api/{provider}", get(probe_provider))
        .route("/api/download/proxy", get(proxy_media))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(cors)
        // Handles Content-Encoding on request bodies before the payload limit applies
        .layer(RequestDecompressionLayer::new())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

pub async fn run(config: Config, address_override: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address_override.unwrap_or(config.server.bind_addr);

    let registry = ProviderRegistry::from_config(&config.providers)
        .map_err(|e| format!("Failed to build provider registry: {}", e))?;
    let fetcher = MediaFetcher::from_config(&config.fetcher, &config.providers.extractor)
        .map_err(|e| format!("Failed to build media fetcher: {}", e))?;
    info!(
        providers = registry.len(),
        download_dir = %fetcher.download_dir().display(),
        "Resolution stack ready"
    );

    let state = AppState::new(config, registry, fetcher);
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "reelgrab API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
