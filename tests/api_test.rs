use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use reelgrab::api::{AppState, router};
use reelgrab::config::{ByteSize, Config};
use reelgrab::fetcher::MediaFetcher;
use reelgrab::platform::Platform;
use reelgrab::providers::fake::ScriptedStrategy;
use reelgrab::providers::{
    FailureKind, NormalizedResult, ProviderRegistry, ResolutionStrategy, TransportKind,
};

const TIKTOK_URL: &str = "https://www.tiktok.com/@creator/video/7300000000000000000";

fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.fetcher.download_dir = temp_dir.path().join("downloads");
    config
}

fn registry_of(strategies: Vec<ScriptedStrategy>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for strategy in strategies {
        registry.register(Arc::new(strategy) as Arc<dyn ResolutionStrategy>);
    }
    registry
}

/// Builds a test app over scripted providers
fn build_test_app_with(config: Config, strategies: Vec<ScriptedStrategy>) -> Router {
    let fetcher = MediaFetcher::new(&config.fetcher).expect("Failed to build fetcher");
    let state = AppState::new(config, registry_of(strategies), fetcher);
    router(state)
}

fn build_test_app(strategies: Vec<ScriptedStrategy>) -> (Router, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = build_test_app_with(test_config(&temp_dir), strategies);
    (app, temp_dir)
}

/// Helper to build a POST /api/download request
fn resolve_request(payload: Value) -> Request<Body> {
    Request::builder()
        .uri("/api/download")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&payload).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_resolve_success() {
    let (app, _temp_dir) = build_test_app(vec![ScriptedStrategy::succeeding(
        "alpha",
        "https://cdn.example.com/v.mp4",
    )]);

    let response = app
        .oneshot(resolve_request(json!({ "url": TIKTOK_URL })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["platform"], "tiktok");
    assert_eq!(body["mediaUrl"], "https://cdn.example.com/v.mp4");
    assert_eq!(body["providerUsed"], "alpha");
    assert_eq!(body["title"], "TikTok Video");
    assert_eq!(body["author"], "Unknown");
    assert!(body.get("errorKind").is_none());
    assert!(body.get("artifact").is_none());
}

#[tokio::test]
async fn test_resolve_falls_back_to_next_provider() {
    let (app, _temp_dir) = build_test_app(vec![
        ScriptedStrategy::failing("alpha", FailureKind::ProviderUnavailable).with_priority(0),
        ScriptedStrategy::succeeding("beta", "https://cdn.example.com/b.mp4").with_priority(10),
    ]);

    let response = app
        .oneshot(resolve_request(json!({ "url": TIKTOK_URL })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["providerUsed"], "beta");
    assert_eq!(body["mediaUrl"], "https://cdn.example.com/b.mp4");
}

#[tokio::test]
async fn test_unusable_result_is_not_reported_as_success() {
    let unusable = NormalizedResult {
        title: "t".into(),
        author: "a".into(),
        thumbnail_url: String::new(),
        media_url: "not a url".into(),
        duration_seconds: 0.0,
        source_provider_id: "alpha".into(),
    };
    let (app, _temp_dir) = build_test_app(vec![ScriptedStrategy::returning("alpha", unusable)]);

    let response = app
        .oneshot(resolve_request(json!({ "url": TIKTOK_URL })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errorKind"], "AllProvidersExhausted");
    assert!(body.get("mediaUrl").is_none());
}

#[tokio::test]
async fn test_all_providers_exhausted() {
    let (app, _temp_dir) = build_test_app(vec![
        ScriptedStrategy::failing("alpha", FailureKind::ProviderUnavailable).with_priority(0),
        ScriptedStrategy::failing("beta", FailureKind::NoUsableMedia).with_priority(10),
    ]);

    let response = app
        .oneshot(resolve_request(json!({ "url": TIKTOK_URL })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["platform"], "tiktok");
    assert_eq!(body["errorKind"], "AllProvidersExhausted");
    assert!(
        body["errorMessage"]
            .as_str()
            .unwrap()
            .contains("all 2 providers failed")
    );
}

#[tokio::test]
async fn test_unsupported_platform() {
    let (app, _temp_dir) =
        build_test_app(vec![ScriptedStrategy::succeeding("alpha", "https://cdn.example.com/v.mp4")]);

    let response = app
        .oneshot(resolve_request(json!({ "url": "https://vimeo.com/123" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errorKind"], "UnsupportedPlatform");
    assert!(body.get("platform").is_none());
}

#[tokio::test]
async fn test_no_provider_configured() {
    // Scripted providers only cover TikTok by default
    let (app, _temp_dir) =
        build_test_app(vec![ScriptedStrategy::succeeding("alpha", "https://cdn.example.com/v.mp4")]);

    let response = app
        .oneshot(resolve_request(json!({ "url": "https://youtu.be/dQw4w9WgXcQ" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["errorKind"], "NoProviderConfigured");
}

#[tokio::test]
async fn test_platform_override() {
    let (app, _temp_dir) = build_test_app(vec![
        ScriptedStrategy::succeeding("yt", "https://cdn.example.com/y.mp4")
            .with_platforms(vec![Platform::YouTube]),
    ]);

    let response = app
        .oneshot(resolve_request(json!({
            "url": "https://m.example.com/watch?v=1",
            "platform": "youtube"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["platform"], "youtube");
    assert_eq!(body["providerUsed"], "yt");
}

#[tokio::test]
async fn test_prefer_local_extractor_reorders_chain() {
    let (app, _temp_dir) = build_test_app(vec![
        ScriptedStrategy::succeeding("remote", "https://cdn.example.com/r.mp4").with_priority(0),
        ScriptedStrategy::succeeding("local", "https://cdn.example.com/l.mp4")
            .with_priority(50)
            .with_transport(TransportKind::Subprocess),
    ]);

    let response = app
        .oneshot(resolve_request(json!({
            "url": TIKTOK_URL,
            "preferLocalExtractor": true
        })))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["providerUsed"], "local");
}

#[tokio::test]
async fn test_invalid_content_type() {
    let (app, _temp_dir) = build_test_app(vec![]);

    let request = Request::builder()
        .uri("/api/download")
        .method("POST")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(json!({ "url": TIKTOK_URL }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn test_missing_and_malformed_url() {
    let (app, _temp_dir) = build_test_app(vec![]);

    let response = app
        .clone()
        .oneshot(resolve_request(json!({ "preferLocalExtractor": true })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(resolve_request(json!({ "url": "tiktok.com/@u/video/1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn test_payload_too_large() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    config.server.max_payload_bytes = ByteSize(32);
    let app = build_test_app_with(config, vec![]);

    let response = app
        .oneshot(resolve_request(json!({ "url": TIKTOK_URL })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_list_providers_in_attempt_order() {
    let (app, _temp_dir) = build_test_app(vec![
        ScriptedStrategy::succeeding("second", "https://cdn.example.com/2.mp4").with_priority(20),
        ScriptedStrategy::succeeding("first", "https://cdn.example.com/1.mp4").with_priority(10),
        ScriptedStrategy::succeeding("insta", "https://cdn.example.com/i.mp4")
            .with_platforms(vec![Platform::Instagram]),
    ]);

    let response = app
        .clone()
        .oneshot(get("/api/download/apis/tiktok"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["platform"], "tiktok");
    let ids: Vec<&str> = body["providers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["first", "second"]);

    let response = app
        .oneshot(get("/api/download/apis/vimeo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_probe_provider() {
    let (app, _temp_dir) = build_test_app(vec![
        ScriptedStrategy::succeeding("alpha", "https://cdn.example.com/v.mp4"),
        ScriptedStrategy::failing("down", FailureKind::ProviderUnavailable),
    ]);

    let response = app
        .clone()
        .oneshot(get("/api/download/test-api/alpha"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["provider"], "alpha");
    assert_eq!(body["reachable"], true);

    let response = app
        .clone()
        .oneshot(get("/api/download/test-api/down"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["reachable"], false);

    let response = app
        .oneshot(get("/api/download/test-api/missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_proxy_rejects_non_http_url() {
    let (app, _temp_dir) = build_test_app(vec![]);

    let response = app
        .oneshot(get("/api/download/proxy?url=file%3A%2F%2F%2Fetc%2Fpasswd"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_metrics() {
    let (app, _temp_dir) = build_test_app(vec![
        ScriptedStrategy::failing("alpha", FailureKind::Timeout).with_priority(0),
        ScriptedStrategy::succeeding("beta", "https://cdn.example.com/v.mp4").with_priority(10),
    ]);

    let response = app
        .clone()
        .oneshot(resolve_request(json!({ "url": TIKTOK_URL })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["providers"], 2);
    assert_eq!(body["metrics"]["resolutionsSucceeded"], 1);
    assert_eq!(body["metrics"]["providerAttempts"], 2);
    assert_eq!(body["metrics"]["providerFailures"], 1);
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let (app, _temp_dir) = build_test_app(vec![]);

    let request = Request::builder()
        .uri("/api/download")
        .method("OPTIONS")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_concurrency_limit_queues_resolutions_only() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    config.server.concurrency_limit = 1;

    let strategy = Arc::new(
        ScriptedStrategy::succeeding("alpha", "https://cdn.example.com/v.mp4")
            .with_delay(Duration::from_millis(200)),
    );
    let mut registry = ProviderRegistry::new();
    registry.register(strategy.clone() as Arc<dyn ResolutionStrategy>);
    let fetcher = MediaFetcher::new(&config.fetcher).unwrap();
    let app = router(AppState::new(config, registry, fetcher));

    let first = tokio::spawn(
        app.clone()
            .oneshot(resolve_request(json!({ "url": TIKTOK_URL }))),
    );
    let second = tokio::spawn(
        app.clone()
            .oneshot(resolve_request(json!({ "url": TIKTOK_URL }))),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(strategy.in_flight(), 1);

    // Routes other than resolve are not gated by the limit
    let health = app.clone().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    for handle in [first, second] {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(strategy.calls(), 2);
}
