mod cli;

use clap::Parser;
use cli::{Cli, Commands, ResolveArgs};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use reelgrab::api::models::{ArtifactView, ResolveRequest, ResolveResponse};
use reelgrab::api::validate_resolve_request;
use reelgrab::config::Config;
use reelgrab::fetcher::MediaFetcher;
use reelgrab::observability::{Metrics, init_tracing};
use reelgrab::orchestrator::FallbackOrchestrator;
use reelgrab::platform::{Platform, classify};
use reelgrab::providers::ProviderRegistry;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<ExitCode, AnyError> {
    let cli = Cli::parse();

    let config = Config::load()?;
    init_tracing(&config.telemetry.log_filter);

    match cli.command {
        Commands::Server(args) => {
            reelgrab::api::run(config, args.address).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve(args) => resolve(config, args).await,
        Commands::Providers(args) => {
            let platform: Platform = args.platform.parse()?;
            let registry = ProviderRegistry::from_config(&config.providers)?;
            print_json(&registry.describe_available(platform))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Probe(args) => {
            let registry = ProviderRegistry::from_config(&config.providers)?;
            let report = registry
                .get(&args.provider)?
                .probe(config.providers.probe_timeout.as_duration())
                .await;
            print_json(&report)?;
            Ok(if report.reachable {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn resolve(config: Config, args: ResolveArgs) -> Result<ExitCode, AnyError> {
    let request = validate_resolve_request(&ResolveRequest {
        url: args.url,
        prefer_local_extractor: args.prefer_local_extractor,
        platform: args.platform,
        quality: args.quality,
        download: Some(args.download),
    })?;

    let metrics = Arc::new(Metrics::new());
    let registry = ProviderRegistry::from_config(&config.providers)?;
    let orchestrator =
        FallbackOrchestrator::new(Arc::new(registry)).with_metrics(metrics.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, abandoning resolution");
            on_interrupt.cancel();
        }
    });

    let platform = request.platform.unwrap_or_else(|| classify(&request.url));
    let result = match orchestrator.resolve_with_cancel(&request, &cancel).await {
        Ok(result) => result,
        Err(failure) => {
            let response = ResolveResponse::failed(
                platform.is_supported().then_some(platform),
                failure.kind.as_str(),
                failure.message,
            );
            print_json(&response)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut response = ResolveResponse::resolved(platform, &result);
    if args.download {
        let fetcher = MediaFetcher::from_config(&config.fetcher, &config.providers.extractor)?
            .with_metrics(metrics);
        let quality = request.quality.unwrap_or_default();
        match fetcher
            .persist(&result, &request.url, platform, quality)
            .await
        {
            Ok(artifact) => {
                info!(path = %artifact.path.display(), "Saved");
                response.artifact = Some(ArtifactView::from(&artifact));
            }
            Err(err) => {
                let kind = err.kind();
                print_json(&response.with_failure(kind, err.to_string()))?;
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    print_json(&response)?;
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
