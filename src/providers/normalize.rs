//! Response normalization rules
//!
//! Each rule reads one provider's response shape and returns [`RawMedia`].
//! Defaults and media-url validation happen later in
//! [`NormalizedResult::from_raw`](super::types::NormalizedResult::from_raw),
//! so rules only pick fields.

use serde_json::Value;

use super::types::RawMedia;
use crate::platform::Platform;

fn string_at(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| string_at(value, key))
}

/// Numbers and numeric strings both appear in the wild.
fn number_at(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "ok" | "success"),
        _ => false,
    }
}

/// Author may be a plain string or an object with a nickname.
fn author_of(data: &Value) -> Option<String> {
    match data.get("author")? {
        Value::String(s) => Some(s.clone()),
        author @ Value::Object(_) => first_string(author, &["nickname", "unique_id", "username"]),
        _ => None,
    }
}

/// TikWM: `{"code":0,"data":{"play":..,"title":..,"author":..,"cover":..,"duration":..}}`
pub fn tikwm(body: &Value, _platform: Platform) -> Option<RawMedia> {
    let data = body.get("data")?;
    let media_url = string_at(data, "play")?;

    Some(RawMedia {
        media_url: Some(media_url),
        title: string_at(data, "title"),
        author: author_of(data),
        thumbnail_url: first_string(data, &["cover", "origin_cover"]),
        duration_seconds: number_at(data, "duration"),
    })
}

/// Generic `{"data": {...}}` envelope with several possible media keys (TTSave).
pub fn data_envelope(body: &Value, _platform: Platform) -> Option<RawMedia> {
    let data = body.get("data")?;
    media_from_data(data)
}

/// `{"success": true, "data": {...}}` envelope (AllInOne, NoonShot, SnapSave).
pub fn success_envelope(body: &Value, platform: Platform) -> Option<RawMedia> {
    if !truthy(body.get("success")) {
        return None;
    }
    data_envelope(body, platform)
}

fn media_from_data(data: &Value) -> Option<RawMedia> {
    let media_url = first_string(data, &["download_url", "url", "play"])?;

    Some(RawMedia {
        media_url: Some(media_url),
        title: string_at(data, "title"),
        author: author_of(data),
        thumbnail_url: first_string(data, &["thumbnail", "cover"]),
        duration_seconds: number_at(data, "duration"),
    })
}

/// Bare `{"url": ".."}` response (SnapTik).
pub fn top_level_url(body: &Value, _platform: Platform) -> Option<RawMedia> {
    Some(RawMedia {
        media_url: Some(string_at(body, "url")?),
        ..Default::default()
    })
}

/// RapidAPI TikTok/Instagram: `data.play` or `data.download_url`.
pub fn rapidapi(body: &Value, _platform: Platform) -> Option<RawMedia> {
    let data = body.get("data")?;
    let media_url = first_string(data, &["play", "download_url"])?;

    Some(RawMedia {
        media_url: Some(media_url),
        title: string_at(data, "title"),
        author: author_of(data),
        thumbnail_url: string_at(data, "cover"),
        duration_seconds: number_at(data, "duration"),
    })
}

/// yt-dlp `--dump-json` output.
///
/// The selected format's URL is top-level `url`; merged formats only report
/// it under `requested_downloads` or `requested_formats`.
pub fn ytdlp_json(info: &Value, _platform: Platform) -> Option<RawMedia> {
    let nested_url = |key: &str| {
        info.get(key)
            .and_then(Value::as_array)
            .and_then(|entries| entries.iter().find_map(|entry| string_at(entry, "url")))
    };

    let media_url = string_at(info, "url")
        .or_else(|| nested_url("requested_downloads"))
        .or_else(|| nested_url("requested_formats"))?;

    Some(RawMedia {
        media_url: Some(media_url),
        title: first_string(info, &["title", "fulltitle"]),
        author: first_string(info, &["uploader", "creator", "channel", "uploader_id"]),
        thumbnail_url: string_at(info, "thumbnail"),
        duration_seconds: number_at(info, "duration"),
    })
}

/// Page scrape produced by the browser strategy:
/// `{"src":..,"poster":..,"title":..,"author":..}`.
pub fn page_scrape(scrape: &Value, _platform: Platform) -> Option<RawMedia> {
    Some(RawMedia {
        media_url: Some(string_at(scrape, "src")?),
        title: string_at(scrape, "title"),
        author: string_at(scrape, "author"),
        thumbnail_url: string_at(scrape, "poster"),
        duration_seconds: number_at(scrape, "duration"),
    })
}
