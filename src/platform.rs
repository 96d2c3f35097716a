//! Platform classification for short-form video page URLs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Video platform a page URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    TikTok,
    Instagram,
    YouTube,
    Unsupported,
}

/// Domain substrings in match priority order. First match wins.
const DOMAIN_RULES: &[(&str, Platform)] = &[
    ("tiktok.com", Platform::TikTok),
    ("instagram.com", Platform::Instagram),
    ("youtube.com", Platform::YouTube),
    ("youtu.be", Platform::YouTube),
];

/// Classify a page URL by domain substring. Never fails.
pub fn classify(url: &str) -> Platform {
    let lower = url.to_ascii_lowercase();

    DOMAIN_RULES
        .iter()
        .find(|(domain, _)| lower.contains(domain))
        .map(|&(_, platform)| platform)
        .unwrap_or(Platform::Unsupported)
}

impl Platform {
    pub const SUPPORTED: [Platform; 3] = [Platform::TikTok, Platform::Instagram, Platform::YouTube];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::YouTube => "youtube",
            Platform::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Platform::Unsupported)
    }

    /// Title used when a provider does not report one.
    pub fn default_title(&self) -> &'static str {
        match self {
            Platform::TikTok => "TikTok Video",
            Platform::Instagram => "Instagram Video",
            Platform::YouTube => "YouTube Video",
            Platform::Unsupported => "Video",
        }
    }

    /// Referer sent when fetching media bytes from the platform's CDN.
    pub fn referer(&self) -> Option<&'static str> {
        match self {
            Platform::TikTok => Some("https://www.tiktok.com/"),
            Platform::Instagram => Some("https://www.instagram.com/"),
            Platform::YouTube => Some("https://www.youtube.com/"),
            Platform::Unsupported => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiktok" => Ok(Platform::TikTok),
            "instagram" => Ok(Platform::Instagram),
            "youtube" => Ok(Platform::YouTube),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// Requested media quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    /// Upper bound on video height in pixels
    MaxHeight(u32),
}

impl Quality {
    /// Format selector understood by yt-dlp compatible extractors.
    pub fn format_selector(&self) -> String {
        match self {
            Quality::Best => "best".to_string(),
            Quality::MaxHeight(height) => format!("best[height<={height}]"),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid quality '{0}', expected 'best' or a height like '720p'")]
pub struct InvalidQuality(pub String);

impl FromStr for Quality {
    type Err = InvalidQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "best" {
            return Ok(Quality::Best);
        }

        normalized
            .strip_suffix('p')
            .and_then(|height| height.parse::<u32>().ok())
            .filter(|height| *height > 0)
            .map(Quality::MaxHeight)
            .ok_or_else(|| InvalidQuality(s.to_string()))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => f.write_str("best"),
            Quality::MaxHeight(height) => write!(f, "{height}p"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tiktok_regardless_of_path() {
        for url in [
            "https://www.tiktok.com/@u/video/123",
            "https://vt.tiktok.com/ZSBVN8pFu/",
            "https://m.tiktok.com/v/1.html?lang=en&ref=instagram.com",
            "HTTPS://WWW.TIKTOK.COM/@someone/video/42",
        ] {
            assert_eq!(classify(url), Platform::TikTok, "{url}");
        }
    }

    #[test]
    fn test_classify_other_platforms() {
        assert_eq!(classify("https://instagram.com/p/abc"), Platform::Instagram);
        assert_eq!(classify("https://www.instagram.com/reel/xyz/"), Platform::Instagram);
        assert_eq!(classify("https://www.youtube.com/shorts/abc"), Platform::YouTube);
        assert_eq!(classify("https://youtu.be/dQw4w9WgXcQ"), Platform::YouTube);
    }

    #[test]
    fn test_classify_priority_order() {
        // Instagram host whose query mentions youtube still classifies as Instagram.
        assert_eq!(
            classify("https://instagram.com/p/abc?from=youtube.com"),
            Platform::Instagram
        );
        assert_eq!(
            classify("https://youtube.com/redirect?q=tiktok.com"),
            Platform::TikTok
        );
    }

    #[test]
    fn test_classify_unsupported() {
        assert_eq!(classify("https://vimeo.com/123"), Platform::Unsupported);
        assert_eq!(classify(""), Platform::Unsupported);
        assert_eq!(classify("not a url at all"), Platform::Unsupported);
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("TikTok".parse::<Platform>().unwrap(), Platform::TikTok);
        assert_eq!("youtube".parse::<Platform>().unwrap(), Platform::YouTube);
        assert!("vimeo".parse::<Platform>().is_err());
        assert!("unsupported".parse::<Platform>().is_err());
    }

    #[test]
    fn test_quality_parsing() {
        assert_eq!("best".parse::<Quality>().unwrap(), Quality::Best);
        assert_eq!("720p".parse::<Quality>().unwrap(), Quality::MaxHeight(720));
        assert!("720".parse::<Quality>().is_err());
        assert!("0p".parse::<Quality>().is_err());
        assert!("hd".parse::<Quality>().is_err());
    }

    #[test]
    fn test_quality_format_selector() {
        assert_eq!(Quality::Best.format_selector(), "best");
        assert_eq!(Quality::MaxHeight(480).format_selector(), "best[height<=480]");
    }
}
