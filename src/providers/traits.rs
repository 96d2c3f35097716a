use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::descriptor::ProviderDescriptor;
use super::types::{AttemptFailure, AttemptOutcome, AttemptTarget, NormalizedResult};

/// Result of a connectivity probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub provider: String,
    pub reachable: bool,
    pub detail: String,
    pub elapsed_ms: u64,
}

/// Capability shared by every resolution provider, whatever its transport.
///
/// Implementations must convert all transport errors into an
/// [`AttemptFailure`] and release any connection, process or browser they
/// acquired before returning, including when the returned future is dropped
/// at a deadline.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Resolve one page URL into a playable media URL
    async fn attempt(&self, target: AttemptTarget<'_>, timeout: Duration) -> AttemptOutcome;

    /// Lightweight reachability check, used by operational tooling only
    async fn probe(&self, timeout: Duration) -> ProbeReport;
}

/// Run the descriptor's normalization rule over a parsed response.
pub(crate) fn normalize_response(
    descriptor: &ProviderDescriptor,
    body: &Value,
    target: AttemptTarget<'_>,
) -> AttemptOutcome {
    let raw = (descriptor.normalize)(body, target.platform).ok_or_else(|| {
        AttemptFailure::no_media(format!(
            "{} response had no playable media field",
            descriptor.display_name
        ))
    })?;

    NormalizedResult::from_raw(raw, target.platform, &descriptor.id)
}
