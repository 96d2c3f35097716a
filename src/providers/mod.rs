//! Resolution providers
//!
//! ## Key Components
//!
//! - [`ResolutionStrategy`] - Capability every provider implements
//! - [`ProviderDescriptor`] - Static description: platforms, transport, timeout, normalization
//! - [`HttpStrategy`], [`ExtractorStrategy`], [`BrowserStrategy`] - The three transports
//! - [`ProviderRegistry`] - Read-only catalog queried per platform
//!
//! ## Example
//!
//! ```rust,ignore
//! use reelgrab::config::ProvidersConfig;
//! use reelgrab::platform::Platform;
//! use reelgrab::providers::ProviderRegistry;
//!
//! let registry = ProviderRegistry::from_config(&ProvidersConfig::default())?;
//! for summary in registry.describe_available(Platform::TikTok) {
//!     println!("{} ({})", summary.name, summary.transport);
//! }
//! ```

mod browser;
pub mod catalog;
mod descriptor;
pub mod extractor;
pub mod fake;
mod http;
pub mod normalize;
mod registry;
mod traits;
mod types;

pub use browser::BrowserStrategy;
pub use catalog::CatalogError;
pub use descriptor::{
    BrowserLaunch, ExtractorCommand, HttpRequestShape, NormalizeFn, ProviderDescriptor,
    ProviderSummary, Transport, TransportKind, UrlParam,
};
pub use extractor::ExtractorStrategy;
pub use http::HttpStrategy;
pub use registry::{ProviderRegistry, RegistryError};
pub use traits::{ProbeReport, ResolutionStrategy};
pub use types::{
    AttemptFailure, AttemptOutcome, AttemptRecord, AttemptTarget, FailureKind, MediaRequest,
    NormalizedResult, RawMedia, ResolutionFailure, ResolutionOutcome, UNKNOWN_AUTHOR,
    is_playable_url,
};
