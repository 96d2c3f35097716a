use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::{info, warn};

use super::{
    error::{ApiError, status_for_failure, status_for_fetch},
    models::{
        ArtifactView, HealthResponse, ProvidersResponse, ProxyQuery, ResolveRequest,
        ResolveResponse,
    },
    state::AppState,
    validation::{RequestValidationError, parse_platform, validate_resolve_request},
};
use crate::fetcher::{artifact_stem, extension_for};
use crate::platform::classify;
use crate::providers::is_playable_url;

/// Resolve a page URL into a playable media URL (POST /api/download)
///
/// ## Flow:
/// 1. Validate Content-Type, read the body within `server.max_payload_bytes`
/// 2. Deserialize and shape-check the request
/// 3. Wait for a resolution slot, then run the provider fallback chain
/// 4. Optionally persist the media when `download` (or the server default) asks for it
///
/// Resolution failures are answered with `success: false` and the failure kind;
/// only malformed requests produce the generic error body.
pub async fn resolve_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    super::utils::parse_content_type(content_type)?;

    let data = read_body(body, state.config.server.max_payload_bytes.as_u64() as usize).await?;
    let wire: ResolveRequest = serde_json::from_slice(&data)?;
    let request = validate_resolve_request(&wire).map_err(map_validation_error)?;

    let _slot = state
        .resolution_slots
        .acquire()
        .await
        .map_err(|_| ApiError::Internal("resolution slots closed".into()))?;

    let platform = request.platform.unwrap_or_else(|| classify(&request.url));
    let result = match state
        .orchestrator
        .resolve_with_cancel(&request, &state.shutdown)
        .await
    {
        Ok(result) => result,
        Err(failure) => {
            info!(
                url = %request.url,
                kind = %failure.kind,
                attempts = %failure.attempt_summary(),
                "Resolution failed"
            );
            let response = ResolveResponse::failed(
                platform.is_supported().then_some(platform),
                failure.kind.as_str(),
                failure.message,
            );
            return Ok((status_for_failure(failure.kind), Json(response)).into_response());
        }
    };

    let mut response = ResolveResponse::resolved(platform, &result);

    let persist = wire
        .download
        .unwrap_or(state.config.fetcher.persist_by_default);
    if persist {
        let quality = request.quality.unwrap_or_default();
        match state
            .fetcher
            .persist(&result, &request.url, platform, quality)
            .await
        {
            Ok(artifact) => response.artifact = Some(ArtifactView::from(&artifact)),
            Err(err) => {
                warn!(error = %err, provider = %result.source_provider_id, "Persisting media failed");
                let status = status_for_fetch(&err);
                let response = response.with_failure(err.kind(), err.to_string());
                return Ok((status, Json(response)).into_response());
            }
        }
    }

    Ok((StatusCode::OK, Json(response)).into_response())
}

fn map_validation_error(err: RequestValidationError) -> ApiError {
    ApiError::InvalidPayload(err.to_string())
}

/// Reads request body and validates size
///
/// Decompression is handled by RequestDecompressionLayer, so the limit
/// applies to the decoded payload.
async fn read_body(body: Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    super::utils::validate_body_size(&data, max_size)?;

    Ok(data)
}

/// Providers configured for a platform, in attempt order (GET /api/download/apis/{platform})
pub async fn list_providers(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let platform = parse_platform(&platform).map_err(map_validation_error)?;

    Ok(Json(ProvidersResponse {
        platform,
        providers: state.registry().describe_available(platform),
    }))
}

/// Reachability check for a single provider (GET /api/download/test-api/{provider})
pub async fn probe_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let strategy = state.registry().get(&provider)?;
    let report = strategy
        .probe(state.config.providers.probe_timeout.as_duration())
        .await;

    Ok(Json(report))
}

/// Relay media bytes with the platform's browser headers (GET /api/download/proxy?url=)
///
/// Some CDNs refuse hotlinked requests; the client downloads through us instead.
/// Only public hosts answering with a media content type are relayed.
pub async fn proxy_media(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    if !is_playable_url(&query.url) {
        return Err(ApiError::InvalidPayload(
            "url must be an absolute http/https media url".into(),
        ));
    }

    let platform = match query.platform.as_deref() {
        Some(value) => parse_platform(value).map_err(map_validation_error)?,
        None => classify(&query.url),
    };

    let media = state.fetcher.open_stream(&query.url, platform).await?;

    let extension = extension_for(media.content_type.as_deref(), &query.url);
    let file_name = format!("{}.{extension}", artifact_stem(platform, ""));

    let mut response = Response::new(Body::from_stream(media.stream));
    let headers = response.headers_mut();
    let content_type = media
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(length) = media.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}

/// Health check endpoint (GET /api/health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        providers: state.registry().len(),
        metrics: state.metrics.snapshot(),
    };

    (StatusCode::OK, Json(response))
}
