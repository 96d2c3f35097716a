//! Built-in provider catalog
//!
//! Every descriptor is built from [`ProvidersConfig`] at startup; nothing here
//! reads the environment. One global priority keeps both platform chains in
//! their intended order:
//!
//! - TikTok: tikwm, ttsave, allinone, noonshot, snaptik, rapidapi, yt-dlp, browser
//! - Instagram: ttsave, allinone, snapsave, rapidapi, yt-dlp, browser
//! - YouTube: yt-dlp

use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::browser::BrowserStrategy;
use super::descriptor::{
    BrowserLaunch, ExtractorCommand, HttpRequestShape, NormalizeFn, ProviderDescriptor, Transport,
    TransportKind, UrlParam,
};
use super::extractor::ExtractorStrategy;
use super::http::HttpStrategy;
use super::normalize;
use super::registry::ProviderRegistry;
use super::traits::ResolutionStrategy;
use crate::config::ProvidersConfig;
use crate::platform::Platform;

pub const TIKWM: &str = "tikwm";
pub const TTSAVE: &str = "ttsave";
pub const ALLINONE: &str = "allinone";
pub const NOONSHOT: &str = "noonshot";
pub const SNAPTIK: &str = "snaptik";
pub const SNAPSAVE: &str = "snapsave";
pub const RAPIDAPI: &str = "rapidapi";
pub const YT_DLP: &str = "yt-dlp";
pub const BROWSER: &str = "browser";

const PRIORITY_STEP: u32 = 10;

/// Global attempt order
const ORDER: &[&str] = &[
    TIKWM, TTSAVE, ALLINONE, NOONSHOT, SNAPTIK, SNAPSAVE, RAPIDAPI, YT_DLP, BROWSER,
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to build provider HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

fn priority_of(id: &str) -> u32 {
    let index = ORDER.iter().position(|known| *known == id).unwrap_or(ORDER.len());
    index as u32 * PRIORITY_STEP
}

struct ApiSpec {
    id: &'static str,
    name: &'static str,
    homepage: &'static str,
    method: Method,
    base_url: &'static str,
    endpoints: &'static [(Platform, &'static str)],
    url_param: UrlParam,
    normalize: NormalizeFn,
}

fn scraping_apis() -> Vec<ApiSpec> {
    vec![
        ApiSpec {
            id: TIKWM,
            name: "TikWM",
            homepage: "https://tikwm.com",
            method: Method::POST,
            base_url: "https://tikwm.com",
            endpoints: &[(Platform::TikTok, "/api/")],
            url_param: UrlParam::JsonBody,
            normalize: normalize::tikwm,
        },
        ApiSpec {
            id: TTSAVE,
            name: "TTSave.app",
            homepage: "https://ttsave.app",
            method: Method::POST,
            base_url: "https://ttsave.app/api",
            endpoints: &[(Platform::TikTok, "/tiktok"), (Platform::Instagram, "/instagram")],
            url_param: UrlParam::JsonBody,
            normalize: normalize::data_envelope,
        },
        ApiSpec {
            id: ALLINONE,
            name: "AllInOne.tools",
            homepage: "https://allinone.tools",
            method: Method::POST,
            base_url: "https://allinone.tools/api",
            endpoints: &[
                (Platform::TikTok, "/tiktok/download"),
                (Platform::Instagram, "/instagram/download"),
            ],
            url_param: UrlParam::JsonBody,
            normalize: normalize::success_envelope,
        },
        ApiSpec {
            id: NOONSHOT,
            name: "TikTok.NoonShot.com",
            homepage: "https://tiktok.noonshot.com",
            method: Method::POST,
            base_url: "https://tiktok.noonshot.com/api",
            endpoints: &[(Platform::TikTok, "/download")],
            url_param: UrlParam::JsonBody,
            normalize: normalize::success_envelope,
        },
        ApiSpec {
            id: SNAPTIK,
            name: "SnapTik",
            homepage: "https://snaptik.app",
            method: Method::POST,
            base_url: "https://snaptik.app",
            endpoints: &[(Platform::TikTok, "/abc")],
            url_param: UrlParam::JsonBody,
            normalize: normalize::top_level_url,
        },
        ApiSpec {
            id: SNAPSAVE,
            name: "SnapSave",
            homepage: "https://snapsave.app",
            method: Method::POST,
            base_url: "https://snapsave.app/api",
            endpoints: &[(Platform::Instagram, "/instagram/download")],
            url_param: UrlParam::JsonBody,
            normalize: normalize::success_envelope,
        },
    ]
}

fn api_descriptor(spec: ApiSpec, config: &ProvidersConfig) -> ProviderDescriptor {
    let endpoints: BTreeMap<Platform, String> = spec
        .endpoints
        .iter()
        .map(|(platform, path)| (*platform, path.to_string()))
        .collect();

    ProviderDescriptor::builder()
        .id(spec.id)
        .display_name(spec.name)
        .homepage(spec.homepage.to_string())
        .platforms(endpoints.keys().copied().collect())
        .transport(Transport::Http(HttpRequestShape {
            method: spec.method,
            base_url: spec.base_url.to_string(),
            endpoints,
            headers: vec![("User-Agent".to_string(), config.user_agent.clone())],
            url_param: spec.url_param,
        }))
        .timeout(config.http_timeout.as_duration())
        .priority(priority_of(spec.id))
        .normalize(spec.normalize)
        .build()
}

fn rapidapi_descriptor(key: &str, config: &ProvidersConfig) -> ProviderDescriptor {
    let base_url = format!("https://{}", config.rapidapi_host);
    let endpoints = BTreeMap::from([
        (Platform::TikTok, "/".to_string()),
        (Platform::Instagram, "/".to_string()),
    ]);

    ProviderDescriptor::builder()
        .id(RAPIDAPI)
        .display_name("RapidAPI TikTok/Instagram")
        .homepage("https://rapidapi.com".to_string())
        .platforms(vec![Platform::TikTok, Platform::Instagram])
        .transport(Transport::Http(HttpRequestShape {
            method: Method::GET,
            base_url,
            endpoints,
            headers: vec![
                ("X-RapidAPI-Key".to_string(), key.to_string()),
                ("X-RapidAPI-Host".to_string(), config.rapidapi_host.clone()),
            ],
            url_param: UrlParam::Query,
        }))
        .timeout(config.http_timeout.as_duration())
        .priority(priority_of(RAPIDAPI))
        .normalize(normalize::rapidapi)
        .build()
}

fn extractor_descriptor(config: &ProvidersConfig) -> ProviderDescriptor {
    ProviderDescriptor::builder()
        .id(YT_DLP)
        .display_name("yt-dlp (local)")
        .homepage("https://github.com/yt-dlp/yt-dlp".to_string())
        .platforms(vec![Platform::TikTok, Platform::Instagram, Platform::YouTube])
        .transport(Transport::Subprocess(ExtractorCommand {
            program: config.extractor.program.clone(),
            base_args: config.extractor.args.clone(),
        }))
        .timeout(config.extractor.timeout.as_duration())
        .priority(priority_of(YT_DLP))
        .normalize(normalize::ytdlp_json)
        .build()
}

fn browser_descriptor(config: &ProvidersConfig) -> ProviderDescriptor {
    let browser = &config.browser;

    ProviderDescriptor::builder()
        .id(BROWSER)
        .display_name("Headless browser")
        .platforms(vec![Platform::TikTok, Platform::Instagram])
        .transport(Transport::Browser(BrowserLaunch {
            executable: browser.executable.clone(),
            media_wait: browser.media_wait.as_duration(),
            user_agent: browser.user_agent.clone(),
        }))
        .timeout(browser.timeout.as_duration())
        .priority(priority_of(BROWSER))
        .normalize(normalize::page_scrape)
        .build()
}

/// Descriptors enabled by `config`, in global priority order.
pub fn builtin_descriptors(config: &ProvidersConfig) -> Vec<ProviderDescriptor> {
    let mut descriptors: Vec<_> = scraping_apis()
        .into_iter()
        .map(|spec| api_descriptor(spec, config))
        .collect();

    if let Some(key) = config.rapidapi_key.as_deref().filter(|key| !key.is_empty()) {
        descriptors.push(rapidapi_descriptor(key, config));
    }
    if config.extractor.enabled {
        descriptors.push(extractor_descriptor(config));
    }
    if config.browser.enabled {
        descriptors.push(browser_descriptor(config));
    }

    descriptors.retain(|descriptor| !config.is_disabled(&descriptor.id));
    descriptors.sort_by_key(|descriptor| descriptor.priority);
    descriptors
}

/// Worst-case time to exhaust every provider for `platform`
pub fn worst_case_latency(config: &ProvidersConfig, platform: Platform) -> Duration {
    builtin_descriptors(config)
        .iter()
        .filter(|descriptor| descriptor.supports(platform))
        .map(|descriptor| descriptor.timeout)
        .sum()
}

/// Shared client for scraping APIs. Deadlines are per request, never global.
pub fn api_client(config: &ProvidersConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.http_timeout.as_duration())
        .build()
}

fn strategy_for(descriptor: ProviderDescriptor, client: &Client) -> Arc<dyn ResolutionStrategy> {
    let descriptor = Arc::new(descriptor);
    match descriptor.transport_kind() {
        TransportKind::Http => Arc::new(HttpStrategy::new(descriptor, client.clone())),
        TransportKind::Subprocess => Arc::new(ExtractorStrategy::new(descriptor)),
        TransportKind::Browser => Arc::new(BrowserStrategy::new(descriptor)),
    }
}

impl ProviderRegistry {
    /// Registry holding every built-in provider `config` enables
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, CatalogError> {
        let client = api_client(config)?;
        let mut registry = Self::new();

        for descriptor in builtin_descriptors(config) {
            registry.register(strategy_for(descriptor, &client));
        }

        info!(
            providers = registry.len(),
            ids = ?registry.ids().collect::<Vec<_>>(),
            "Provider registry initialized"
        );

        Ok(registry)
    }
}
