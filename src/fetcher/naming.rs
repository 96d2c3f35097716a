//! Artifact file naming

use uuid::Uuid;

use crate::platform::Platform;

const MAX_TITLE_CHARS: usize = 50;
const FALLBACK_EXTENSION: &str = "mp4";

/// Keep ASCII alphanumerics, `-` and `_`; everything else collapses into `_`.
pub fn sanitize_title(title: &str) -> String {
    let mut cleaned = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            cleaned.push(c);
        } else if !cleaned.ends_with('_') {
            cleaned.push('_');
        }
    }

    let truncated: String = cleaned
        .trim_matches('_')
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let truncated = truncated.trim_end_matches('_');

    if truncated.is_empty() {
        "video".to_string()
    } else {
        truncated.to_string()
    }
}

/// `{platform}_{title}_{uuid v7}` without extension.
///
/// UUID v7 keeps names unique across processes and sortable by creation time.
pub fn artifact_stem(platform: Platform, title: &str) -> String {
    format!("{}_{}_{}", platform.as_str(), sanitize_title(title), Uuid::now_v7())
}

/// Pick an extension from the response content type, then the URL path.
pub fn extension_for(content_type: Option<&str>, media_url: &str) -> &'static str {
    content_type
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .and_then(|parsed| extension_for_mime(&parsed))
        .or_else(|| extension_from_url(media_url))
        .unwrap_or(FALLBACK_EXTENSION)
}

fn extension_for_mime(parsed: &mime::Mime) -> Option<&'static str> {
    match (parsed.type_().as_str(), parsed.subtype().as_str()) {
        ("video", "mp4") => Some("mp4"),
        ("video", "webm") => Some("webm"),
        ("video", "quicktime") => Some("mov"),
        ("video", "x-matroska") => Some("mkv"),
        ("audio", "mpeg") => Some("mp3"),
        ("audio", "mp4") => Some("m4a"),
        ("image", "jpeg") => Some("jpg"),
        ("image", "webp") => Some("webp"),
        _ => None,
    }
}

fn extension_from_url(media_url: &str) -> Option<&'static str> {
    let parsed = url::Url::parse(media_url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;

    ["mp4", "webm", "mov", "mkv", "mp3", "m4a", "jpg", "webp"]
        .into_iter()
        .find(|known| known.eq_ignore_ascii_case(ext))
}
