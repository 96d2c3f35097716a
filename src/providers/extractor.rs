//! Local extractor strategy: spawns a yt-dlp compatible binary

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use super::descriptor::{ExtractorCommand, ProviderDescriptor, Transport};
use super::traits::{ProbeReport, ResolutionStrategy, normalize_response};
use super::types::{AttemptFailure, AttemptOutcome, AttemptTarget};
use crate::platform::Quality;

/// Longest stderr excerpt carried into failure messages.
const STDERR_EXCERPT: usize = 300;

pub struct ExtractorStrategy {
    descriptor: Arc<ProviderDescriptor>,
}

impl ExtractorStrategy {
    pub fn new(descriptor: Arc<ProviderDescriptor>) -> Self {
        Self { descriptor }
    }

    fn command(&self) -> Result<&ExtractorCommand, AttemptFailure> {
        match &self.descriptor.transport {
            Transport::Subprocess(command) => Ok(command),
            other => Err(AttemptFailure::unavailable(format!(
                "provider {} is not an extractor provider ({})",
                self.descriptor.id,
                other.kind()
            ))),
        }
    }
}

/// Arguments for a metadata-only run printing one JSON document.
pub fn dump_json_args(page_url: &str, quality: Quality) -> Vec<String> {
    vec![
        "--dump-json".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--format".to_string(),
        quality.format_selector(),
        page_url.to_string(),
    ]
}

/// Arguments for saving the media straight to `output`.
pub fn save_args(page_url: &str, quality: Quality, output: &Path) -> Vec<String> {
    vec![
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--no-part".to_string(),
        "--format".to_string(),
        quality.format_selector(),
        "--output".to_string(),
        output.display().to_string(),
        page_url.to_string(),
    ]
}

/// Build a child process that dies with its handle.
pub fn spawnable(command: &ExtractorCommand, args: &[String]) -> Command {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.base_args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Run the extractor to completion or kill it at `timeout`.
pub async fn run_extractor(
    command: &ExtractorCommand,
    args: &[String],
    timeout: Duration,
) -> Result<std::process::Output, AttemptFailure> {
    let child = spawnable(command, args).spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            AttemptFailure::unavailable(format!("extractor binary '{}' not found", command.program))
        }
        ErrorKind::PermissionDenied => AttemptFailure::unavailable(format!(
            "extractor binary '{}' is not executable",
            command.program
        )),
        _ => AttemptFailure::unavailable(format!("failed to start extractor: {e}")),
    })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AttemptFailure::unavailable(format!("extractor I/O error: {e}"))),
        Err(_) => Err(AttemptFailure::timeout(format!(
            "extractor did not finish within {}ms",
            timeout.as_millis()
        ))),
    }
}

pub fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    match trimmed.char_indices().nth(STDERR_EXCERPT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// yt-dlp prints one JSON object per line; the first parseable one wins.
fn parse_info(stdout: &[u8]) -> Option<Value> {
    let text = String::from_utf8_lossy(stdout);
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<Value>(line).ok())
}

#[async_trait]
impl ResolutionStrategy for ExtractorStrategy {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn attempt(&self, target: AttemptTarget<'_>, timeout: Duration) -> AttemptOutcome {
        let command = self.command()?;
        let args = dump_json_args(target.url, target.quality);

        debug!(provider = %self.descriptor.id, program = %command.program, "Running extractor");
        let output = run_extractor(command, &args, timeout).await?;

        if !output.status.success() {
            let excerpt = stderr_excerpt(&output.stderr);
            warn!(provider = %self.descriptor.id, status = ?output.status.code(), stderr = %excerpt, "Extractor exited with failure");
            return Err(AttemptFailure::no_media(format!(
                "extractor exited with {}: {}",
                output.status, excerpt
            )));
        }

        let info = parse_info(&output.stdout)
            .ok_or_else(|| AttemptFailure::no_media("extractor printed no JSON document"))?;

        normalize_response(&self.descriptor, &info, target)
    }

    async fn probe(&self, timeout: Duration) -> ProbeReport {
        let started = Instant::now();
        let (reachable, detail) = match self.command() {
            Err(failure) => (false, failure.message),
            Ok(command) => match run_extractor(command, &["--version".to_string()], timeout).await {
                Ok(output) if output.status.success() => (
                    true,
                    format!("version {}", String::from_utf8_lossy(&output.stdout).trim()),
                ),
                Ok(output) => (false, stderr_excerpt(&output.stderr)),
                Err(failure) => (false, failure.message),
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
    use crate::platform::Platform;
    use crate::providers::normalize;
    use crate::providers::types::FailureKind;

    fn descriptor(program: &str, base_args: &[&str]) -> Arc<ProviderDescriptor> {
        Arc::new(
            ProviderDescriptor::builder()
                .id("yt-dlp")
                .display_name("yt-dlp")
                .platforms(vec![Platform::TikTok, Platform::YouTube])
                .transport(Transport::Subprocess(ExtractorCommand {
                    program: program.to_string(),
                    base_args: base_args.iter().map(|s| s.to_string()).collect(),
                }))
                .timeout(Duration::from_secs(5))
                .normalize(normalize::ytdlp_json)
                .build(),
        )
    }

    fn target(url: &str) -> AttemptTarget<'_> {
        AttemptTarget {
            url,
            platform: Platform::YouTube,
            quality: Quality::Best,
        }
    }

    #[test]
    fn test_dump_json_args_carry_quality() {
        let args = dump_json_args("https://youtu.be/x", Quality::MaxHeight(720));
        assert!(args.contains(&"--dump-json".to_string()));
        assert!(args.contains(&"best[height<=720]".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
    }

    #[test]
    fn test_parse_info_skips_noise() {
        let stdout = b"[info] something\n{\"url\": \"https://v/x.mp4\"}\n";
        let info = parse_info(stdout).unwrap();
        assert_eq!(info["url"], "https://v/x.mp4");
        assert!(parse_info(b"not json\n{broken").is_none());
    }

    #[test]
    fn test_stderr_excerpt_truncates() {
        let long = "e".repeat(1000);
        let excerpt = stderr_excerpt(long.as_bytes());
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.len(), STDERR_EXCERPT + 3);
    }

    #[tokio::test]
    async fn test_missing_binary_is_provider_unavailable() {
        let strategy = ExtractorStrategy::new(descriptor("reelgrab-definitely-missing-binary", &[]));
        let err = strategy
            .attempt(target("https://youtu.be/x"), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::ProviderUnavailable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_structured_output_is_normalized() {
        // `sh -c <script> <$0> <args...>`: extractor flags land in positional args.
        let script = r#"echo '{"url":"https://v/x.mp4","title":"Clip","uploader":"me","duration":9}'"#;
        let strategy = ExtractorStrategy::new(descriptor("sh", &["-c", script, "extractor"]));
        let result = strategy
            .attempt(target("https://youtu.be/x"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.media_url, "https://v/x.mp4");
        assert_eq!(result.author, "me");
        assert_eq!(result.source_provider_id, "yt-dlp");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unparseable_output_is_no_usable_media() {
        let strategy = ExtractorStrategy::new(descriptor("sh", &["-c", "echo garbage", "extractor"]));
        let err = strategy
            .attempt(target("https://youtu.be/x"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::NoUsableMedia);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_no_usable_media() {
        let strategy =
            ExtractorStrategy::new(descriptor("sh", &["-c", "echo 'ERROR: Unsupported URL' >&2; exit 1", "extractor"]));
        let err = strategy
            .attempt(target("https://youtu.be/x"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::NoUsableMedia);
        assert!(err.message.contains("Unsupported URL"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_extractor_times_out() {
        let strategy = ExtractorStrategy::new(descriptor("sh", &["-c", "sleep 5", "extractor"]));
        let started = Instant::now();
        let err = strategy
            .attempt(target("https://youtu.be/x"), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
