//! Headless browser strategy
//!
//! A [`BrowserSession`] moves through
//! `Launched -> Navigated -> MediaAwaited -> Extracted -> TornDown`.
//! Every failure after launch still passes through `teardown`, and a session
//! dropped mid-flight (the orchestrator abandoning it at a deadline) is torn
//! down from `Drop`: the handler task is aborted and the browser process is
//! killed by chromiumoxide's own `Drop`.
//!
//! The throwaway profile directory is owned by a [`ProfileDir`] guard created
//! before the browser starts, so it is removed even when the launch itself is
//! abandoned.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::descriptor::{BrowserLaunch, ProviderDescriptor, Transport};
use super::traits::{ProbeReport, ResolutionStrategy, normalize_response};
use super::types::{AttemptFailure, AttemptOutcome, AttemptTarget};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const CLOSE_GRACE: Duration = Duration::from_secs(3);

const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-sync",
    "--mute-audio",
    "--no-first-run",
    "--autoplay-policy=no-user-gesture-required",
];

/// Reads the live media element plus adjacent metadata. Always returns an
/// object so an unpopulated page is `{"src": null, ...}` rather than `null`.
const SCRAPE_SCRIPT: &str = r#"(() => {
  const meta = (key) => {
    const el = document.querySelector(`meta[property="${key}"]`) || document.querySelector(`meta[name="${key}"]`);
    return el && el.content ? el.content : null;
  };
  const video = document.querySelector('video');
  let src = null;
  if (video) {
    const source = video.querySelector('source');
    src = video.currentSrc || video.src || (source ? source.src : null) || null;
  }
  if (!src || src.startsWith('blob:')) {
    src = meta('og:video:secure_url') || meta('og:video') || null;
  }
  const authorEl = document.querySelector('[data-e2e="browse-username"], [data-e2e="video-author-uniqueid"], header a[role="link"]');
  return {
    src: src,
    poster: (video && video.poster) || meta('og:image'),
    title: meta('og:title') || document.title || null,
    author: authorEl ? authorEl.textContent.trim() : null,
    duration: video && isFinite(video.duration) ? video.duration : null
  };
})()"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Launched,
    Navigated,
    MediaAwaited,
    Extracted,
    TornDown,
}

/// Per-session browser profile, deleted on drop unless already removed
struct ProfileDir {
    path: PathBuf,
    removed: bool,
}

impl ProfileDir {
    fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(format!("reelgrab-browser-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(&mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            debug!(error = %e, path = %self.path.display(), "Profile directory cleanup skipped");
        }
        self.removed = true;
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

// Field order matters: the browser is killed before its profile is deleted.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile: ProfileDir,
    stage: Stage,
    provider: String,
}

impl BrowserSession {
    fn config(launch: &BrowserLaunch, profile_dir: &Path) -> Result<BrowserConfig, String> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(profile_dir)
            .args(LAUNCH_ARGS.iter().copied())
            .arg(format!("--user-agent={}", launch.user_agent));

        if let Some(executable) = &launch.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build()
    }

    /// Launch failures are `ProviderUnavailable` for this provider only.
    async fn launch(
        launch: &BrowserLaunch,
        provider: &str,
        profile_root: &Path,
    ) -> Result<Self, AttemptFailure> {
        let profile = ProfileDir::create(profile_root).map_err(|e| {
            AttemptFailure::unavailable(format!("failed to create browser profile: {e}"))
        })?;
        let config = Self::config(launch, profile.path())
            .map_err(|e| AttemptFailure::unavailable(format!("browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AttemptFailure::unavailable(format!("failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!(provider, profile = %profile.path().display(), "Browser launched");

        Ok(Self {
            browser,
            handler,
            profile,
            stage: Stage::Launched,
            provider: provider.to_string(),
        })
    }

    async fn navigate(&mut self, url: &str) -> Result<Page, AttemptFailure> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| AttemptFailure::unavailable(format!("failed to open page: {e}")))?;

        self.stage = Stage::Navigated;
        Ok(page)
    }

    /// Poll the page until its media element has a usable source, bounded by `wait`.
    async fn await_media(&mut self, page: &Page, wait: Duration) -> Result<Value, AttemptFailure> {
        let deadline = Instant::now() + wait;
        let mut last_error = None;

        loop {
            match evaluate_scrape(page).await {
                Ok(scrape) if scrape.get("src").is_some_and(|src| src.is_string()) => {
                    self.stage = Stage::MediaAwaited;
                    return Ok(scrape);
                }
                Ok(_) => {}
                Err(e) => last_error = Some(e),
            }

            if Instant::now() + POLL_INTERVAL > deadline {
                let detail = last_error.map(|e| format!(" (last error: {e})")).unwrap_or_default();
                return Err(AttemptFailure::no_media(format!(
                    "media element not populated within {}ms{detail}",
                    wait.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn drive(&mut self, url: &str, wait: Duration) -> Result<Value, AttemptFailure> {
        let page = self.navigate(url).await?;
        let scrape = self.await_media(&page, wait).await?;
        self.stage = Stage::Extracted;
        Ok(scrape)
    }

    async fn teardown(&mut self) {
        if self.stage == Stage::TornDown {
            return;
        }

        let closed = tokio::time::timeout(CLOSE_GRACE, async {
            let _ = self.browser.close().await;
            let _ = self.browser.wait().await;
        })
        .await;
        if closed.is_err() {
            warn!(provider = %self.provider, "Browser did not close in time, killing on drop");
        }

        self.handler.abort();
        self.profile.remove().await;

        debug!(provider = %self.provider, from = ?self.stage, "Browser torn down");
        self.stage = Stage::TornDown;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.stage == Stage::TornDown {
            return;
        }

        warn!(provider = %self.provider, stage = ?self.stage, "Browser session abandoned, tearing down");
        self.handler.abort();
    }
}

async fn evaluate_scrape(page: &Page) -> Result<Value, String> {
    let params = EvaluateParams::builder()
        .expression(SCRAPE_SCRIPT)
        .return_by_value(true)
        .build()?;

    page.evaluate_expression(params)
        .await
        .map_err(|e| e.to_string())?
        .into_value::<Value>()
        .map_err(|e| e.to_string())
}

/// Renders the page in a throwaway headless browser and reads its `<video>`
pub struct BrowserStrategy {
    descriptor: Arc<ProviderDescriptor>,
    profile_root: PathBuf,
}

impl BrowserStrategy {
    pub fn new(descriptor: Arc<ProviderDescriptor>) -> Self {
        Self {
            descriptor,
            profile_root: std::env::temp_dir(),
        }
    }

    /// Directory under which each session's profile is created
    pub fn with_profile_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profile_root = root.into();
        self
    }

    fn launch_config(&self) -> Result<&BrowserLaunch, AttemptFailure> {
        match &self.descriptor.transport {
            Transport::Browser(launch) => Ok(launch),
            other => Err(AttemptFailure::unavailable(format!(
                "provider {} is not a browser provider ({})",
                self.descriptor.id,
                other.kind()
            ))),
        }
    }
}

#[async_trait]
impl ResolutionStrategy for BrowserStrategy {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn attempt(&self, target: AttemptTarget<'_>, timeout: Duration) -> AttemptOutcome {
        let launch = self.launch_config()?;
        let wait = launch.media_wait.min(timeout);

        let mut session =
            BrowserSession::launch(launch, &self.descriptor.id, &self.profile_root).await?;
        let scraped = match tokio::time::timeout(timeout, session.drive(target.url, wait)).await {
            Ok(result) => result,
            Err(_) => Err(AttemptFailure::timeout(format!(
                "browser scrape exceeded {}ms",
                timeout.as_millis()
            ))),
        };
        session.teardown().await;

        normalize_response(&self.descriptor, &scraped?, target)
    }

    async fn probe(&self, _timeout: Duration) -> ProbeReport {
        let started = Instant::now();
        let probe_dir = std::env::temp_dir().join("reelgrab-browser-probe");

        // Building a config resolves the executable without starting it.
        let (reachable, detail) = match self.launch_config() {
            Err(failure) => (false, failure.message),
            Ok(launch) => match BrowserSession::config(launch, &probe_dir) {
                Ok(_) => (true, "browser executable located".to_string()),
                Err(e) => (false, e),
            },
        };

        ProbeReport {
            provider: self.descriptor.id.clone(),
            reachable,
            detail,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Platform, Quality};
    use crate::providers::normalize;
    use crate::providers::types::FailureKind;

    fn descriptor(executable: &str) -> Arc<ProviderDescriptor> {
        Arc::new(
            ProviderDescriptor::builder()
                .id("browser")
                .display_name("Headless browser")
                .platforms(vec![Platform::TikTok])
                .transport(Transport::Browser(BrowserLaunch {
                    executable: Some(PathBuf::from(executable)),
                    media_wait: Duration::from_secs(1),
                    user_agent: "test-agent".to_string(),
                }))
                .timeout(Duration::from_secs(5))
                .normalize(normalize::page_scrape)
                .build(),
        )
    }

    #[tokio::test]
    async fn test_launch_failure_is_provider_unavailable() {
        let strategy = BrowserStrategy::new(descriptor("/nonexistent/reelgrab-chrome"));
        let target = AttemptTarget {
            url: "https://www.tiktok.com/@u/video/1",
            platform: Platform::TikTok,
            quality: Quality::Best,
        };

        let err = strategy.attempt(target, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::ProviderUnavailable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_abandoned_launch_removes_profile() {
        use std::os::unix::fs::PermissionsExt;

        // A "browser" that never prints its DevTools endpoint keeps the launch pending
        let bin_dir = tempfile::tempdir().unwrap();
        let executable = bin_dir.path().join("stalling-chrome");
        std::fs::write(&executable, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&executable, std::fs::Permissions::from_mode(0o755)).unwrap();

        let profile_root = tempfile::tempdir().unwrap();
        let strategy = BrowserStrategy::new(descriptor(executable.to_str().unwrap()))
            .with_profile_root(profile_root.path());
        let target = AttemptTarget {
            url: "https://www.tiktok.com/@u/video/1",
            platform: Platform::TikTok,
            quality: Quality::Best,
        };

        // Dropping the attempt at the deadline is what the orchestrator does
        let _ = tokio::time::timeout(
            Duration::from_millis(300),
            strategy.attempt(target, Duration::from_secs(5)),
        )
        .await;

        let leftovers: Vec<_> = std::fs::read_dir(profile_root.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "profile directories leaked: {leftovers:?}");
    }

    #[test]
    fn test_profile_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let profile = ProfileDir::create(root.path()).unwrap();
        let path = profile.path().to_path_buf();
        assert!(path.is_dir());

        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn test_scrape_script_returns_object() {
        assert!(SCRAPE_SCRIPT.trim_start().starts_with("(() =>"));
        assert!(SCRAPE_SCRIPT.contains("return {"));
    }
}
