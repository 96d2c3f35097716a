//! Scripted provider for development and tests
//!
//! Behaves like a real strategy (descriptor, deadline, probe) but answers from
//! a script instead of the network.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::descriptor::{
    BrowserLaunch, ExtractorCommand, HttpRequestShape, ProviderDescriptor, Transport,
    TransportKind, UrlParam,
};
use super::normalize;
use super::traits::{ProbeReport, ResolutionStrategy};
use super::types::{
    AttemptFailure, AttemptOutcome, AttemptTarget, FailureKind, NormalizedResult, RawMedia,
};
use crate::platform::Platform;

/// Provider ids in the order they were attempted, shared between fakes
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone)]
enum Script {
    Succeed(RawMedia),
    /// Returned as-is, skipping normalization
    Verbatim(NormalizedResult),
    Fail(AttemptFailure),
    Hang,
}

#[derive(Debug)]
pub struct ScriptedStrategy {
    descriptor: ProviderDescriptor,
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    log: Option<CallLog>,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn transport(id: &str, kind: TransportKind) -> Transport {
    match kind {
        TransportKind::Http => Transport::Http(HttpRequestShape {
            method: reqwest::Method::POST,
            base_url: format!("http://{id}.invalid"),
            endpoints: BTreeMap::new(),
            headers: Vec::new(),
            url_param: UrlParam::JsonBody,
        }),
        TransportKind::Subprocess => Transport::Subprocess(ExtractorCommand {
            program: id.to_string(),
            base_args: Vec::new(),
        }),
        TransportKind::Browser => Transport::Browser(BrowserLaunch {
            executable: None,
            media_wait: Duration::from_secs(1),
            user_agent: String::new(),
        }),
    }
}

impl ScriptedStrategy {
    fn with_script(id: &str, script: Script) -> Self {
        let descriptor = ProviderDescriptor::builder()
            .id(id)
            .display_name(format!("Scripted {id}"))
            .platforms(vec![Platform::TikTok])
            .transport(transport(id, TransportKind::Http))
            .timeout(Duration::from_secs(1))
            .normalize(normalize::top_level_url)
            .build();

        Self {
            descriptor,
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            log: None,
        }
    }

    pub fn succeeding(id: &str, media_url: &str) -> Self {
        Self::with_script(
            id,
            Script::Succeed(RawMedia {
                media_url: Some(media_url.to_string()),
                ..Default::default()
            }),
        )
    }

    pub fn succeeding_with(id: &str, raw: RawMedia) -> Self {
        Self::with_script(id, Script::Succeed(raw))
    }

    /// Returns `result` untouched, even if it is unusable.
    pub fn returning(id: &str, result: NormalizedResult) -> Self {
        Self::with_script(id, Script::Verbatim(result))
    }

    pub fn failing(id: &str, kind: FailureKind) -> Self {
        Self::with_script(
            id,
            Script::Fail(AttemptFailure::new(kind, format!("scripted {kind}"))),
        )
    }

    /// Never answers; only a deadline or cancellation ends the attempt.
    pub fn hanging(id: &str) -> Self {
        Self::with_script(id, Script::Hang)
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.descriptor.priority = priority;
        self
    }

    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.descriptor.platforms = platforms;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.descriptor.timeout = timeout;
        self
    }

    pub fn with_transport(mut self, kind: TransportKind) -> Self {
        self.descriptor.transport = transport(&self.descriptor.id, kind);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Attempts started but not yet finished or dropped
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResolutionStrategy for ScriptedStrategy {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn attempt(&self, target: AttemptTarget<'_>, _timeout: Duration) -> AttemptOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            if let Ok(mut log) = log.lock() {
                log.push(self.descriptor.id.clone());
            }
        }

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.script {
            Script::Succeed(raw) => {
                NormalizedResult::from_raw(raw.clone(), target.platform, &self.descriptor.id)
            }
            Script::Verbatim(result) => Ok(result.clone()),
            Script::Fail(failure) => Err(failure.clone()),
            Script::Hang => std::future::pending().await,
        }
    }

    async fn probe(&self, _timeout: Duration) -> ProbeReport {
        let reachable = !matches!(
            &self.script,
            Script::Fail(AttemptFailure {
                kind: FailureKind::ProviderUnavailable,
                ..
            })
        );

        ProbeReport {
            provider: self.descriptor.id.clone(),
            reachable,
            detail: "scripted".to_string(),
            elapsed_ms: 0,
        }
    }
}
