use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::ErrorResponse;
use crate::fetcher::FetchError;
use crate::providers::{FailureKind, RegistryError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("upstream failed: {0}")]
    Upstream(String),
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Upstream(_) => "UPSTREAM_FAILED",
            ApiError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// HTTP status for a failed resolution
pub fn status_for_failure(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::UnsupportedPlatform => StatusCode::BAD_REQUEST,
        FailureKind::NoProviderConfigured => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::ProviderUnavailable
        | FailureKind::NoUsableMedia
        | FailureKind::AllProvidersExhausted => StatusCode::BAD_GATEWAY,
    }
}

/// HTTP status for a failed download after a successful resolution
pub fn status_for_fetch(err: &FetchError) -> StatusCode {
    match err {
        FetchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FetchError::ArtifactTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        FetchError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FetchError::ForbiddenHost(_) => StatusCode::FORBIDDEN,
        FetchError::Http(_)
        | FetchError::EmptyArtifact
        | FetchError::Extractor(_)
        | FetchError::NotMedia(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(value: RegistryError) -> Self {
        ApiError::NotFound(value.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(value: FetchError) -> Self {
        match value {
            FetchError::Timeout => ApiError::UpstreamTimeout(value.to_string()),
            FetchError::Io(_) => ApiError::Internal(value.to_string()),
            FetchError::ForbiddenHost(_) => ApiError::Forbidden(value.to_string()),
            _ => ApiError::Upstream(value.to_string()),
        }
    }
}
