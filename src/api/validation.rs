use thiserror::Error;

use super::models::ResolveRequest;
use crate::platform::{Platform, Quality};
use crate::providers::MediaRequest;

const MAX_URL_LEN: usize = 2048;

#[derive(Debug, Error)]
pub enum RequestValidationError {
    #[error("url is required")]
    MissingUrl,
    #[error("url exceeds 2048 characters")]
    UrlTooLong,
    #[error("url must be an http/https page url")]
    InvalidUrl,
    #[error("unknown platform '{0}', expected tiktok, instagram or youtube")]
    UnknownPlatform(String),
    #[error(transparent)]
    InvalidQuality(#[from] crate::platform::InvalidQuality),
}

/// Turn the wire request into a [`MediaRequest`].
///
/// Only shape is checked here; an unrecognized domain is left to the
/// orchestrator, which answers `UnsupportedPlatform`.
pub fn validate_resolve_request(
    request: &ResolveRequest,
) -> Result<MediaRequest, RequestValidationError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(RequestValidationError::MissingUrl);
    }
    if url.len() > MAX_URL_LEN {
        return Err(RequestValidationError::UrlTooLong);
    }

    let parsed = url::Url::parse(url).map_err(|_| RequestValidationError::InvalidUrl)?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
        return Err(RequestValidationError::InvalidUrl);
    }

    let platform = request
        .platform
        .as_deref()
        .map(parse_platform)
        .transpose()?;
    let quality = request
        .quality
        .as_deref()
        .map(str::parse::<Quality>)
        .transpose()?;

    Ok(MediaRequest::new(url)
        .with_platform(platform)
        .with_quality(quality)
        .prefer_local_extractor(request.prefer_local_extractor))
}

pub fn parse_platform(value: &str) -> Result<Platform, RequestValidationError> {
    value
        .parse::<Platform>()
        .map_err(|_| RequestValidationError::UnknownPlatform(value.to_string()))
}
