use super::models::Config;
use config::{ConfigError, Environment, File, Map};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "REELGRAB_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/reelgrab.toml";
const ENV_PREFIX: &str = "REELGRAB";
const ENV_SEPARATOR: &str = "__";
const RAPIDAPI_KEY_VAR: &str = "RAPIDAPI_KEY";
const LIST_SEPARATOR: &str = ",";

/// Keys given as comma-separated lists in the environment,
/// e.g. `REELGRAB__PROVIDERS__DISABLED=snaptik,browser`
const LIST_KEYS: &[&str] = &[
    "server.cors_origins",
    "providers.disabled",
    "providers.extractor.args",
];

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never read from TOML, only from the environment
fn load_secrets(config: &mut Config) {
    config.providers.rapidapi_key = env::var(RAPIDAPI_KEY_VAR)
        .ok()
        .filter(|key| !key.trim().is_empty());
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    load_with_environment(config_path, None)
}

/// `REELGRAB__PROVIDERS__HTTP_TIMEOUT` -> `providers.http_timeout`.
/// `vars` replaces the process environment when set.
fn environment(vars: Option<Map<String, String>>) -> Environment {
    LIST_KEYS
        .iter()
        .fold(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .list_separator(LIST_SEPARATOR)
                .try_parsing(true),
            |env, key| env.with_list_parse_key(key),
        )
        .source(vars)
}

fn load_with_environment(
    config_path: PathBuf,
    vars: Option<Map<String, String>>,
) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    builder = builder.add_source(environment(vars));

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.providers.extractor.program, "yt-dlp");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
request_timeout = "2m"
max_payload_bytes = "32KB"
cors_origins = ["https://app.example.com"]

[providers]
http_timeout = "8s"
disabled = ["snaptik"]

[providers.extractor]
program = "python3"
args = ["-m", "yt_dlp"]
timeout = 45

[providers.browser]
enabled = true
media_wait = "10s"

[fetcher]
download_dir = "media"
max_artifact_bytes = "200MB"
persist_by_default = true
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.request_timeout.as_duration(), Duration::from_secs(120));
        assert_eq!(config.server.max_payload_bytes.as_u64(), 32 * 1024);
        assert_eq!(config.server.cors_origins, vec!["https://app.example.com"]);
        assert_eq!(config.providers.http_timeout.as_duration(), Duration::from_secs(8));
        assert_eq!(config.providers.disabled, vec!["snaptik"]);
        assert_eq!(config.providers.extractor.args, vec!["-m", "yt_dlp"]);
        assert_eq!(config.providers.extractor.timeout.as_duration(), Duration::from_secs(45));
        assert!(config.providers.browser.enabled);
        assert_eq!(config.fetcher.download_dir, PathBuf::from("media"));
        assert_eq!(config.fetcher.max_artifact_bytes.as_u64(), 200 * 1024 * 1024);
        assert!(config.fetcher.persist_by_default);
    }

    #[test]
    fn test_rapidapi_key_is_not_read_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[providers]\nrapidapi_key = \"from-file\"\n").unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert!(config.providers.rapidapi_key.is_none());
    }

    fn env_vars(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_overrides_list_keys() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("empty.toml");
        fs::write(&config_path, "").unwrap();

        let vars = env_vars(&[
            ("REELGRAB__PROVIDERS__DISABLED", "tikwm"),
            ("REELGRAB__SERVER__CORS_ORIGINS", "https://a.example,https://b.example"),
            ("REELGRAB__PROVIDERS__EXTRACTOR__ARGS", "-m,yt_dlp"),
            ("REELGRAB__PROVIDERS__HTTP_TIMEOUT", "8s"),
        ]);

        let config = load_with_environment(config_path, Some(vars)).unwrap();
        assert_eq!(config.providers.disabled, vec!["tikwm"]);
        assert_eq!(
            config.server.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.providers.extractor.args, vec!["-m", "yt_dlp"]);
        assert_eq!(config.providers.http_timeout.as_duration(), Duration::from_secs(8));
    }

    #[test]
    fn test_env_list_overrides_toml_list() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[providers]\ndisabled = [\"snaptik\"]\n").unwrap();

        let vars = env_vars(&[("REELGRAB__PROVIDERS__DISABLED", "noonshot,browser")]);

        let config = load_with_environment(config_path, Some(vars)).unwrap();
        assert_eq!(config.providers.disabled, vec!["noonshot", "browser"]);
    }
}
