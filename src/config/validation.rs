use super::models::Config;
use crate::humanize::HumanDuration;
use crate::platform::Platform;
use crate::providers::catalog;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Timeout must be positive: {field}")]
    ZeroTimeout { field: String },

    #[error(
        "Worst-case {platform} resolution takes {worst_case}, longer than server.request_timeout ({budget})"
    )]
    BudgetExceeded {
        platform: Platform,
        worst_case: String,
        budget: String,
    },

    #[error("Browser media_wait ({media_wait}) must be shorter than its timeout ({timeout})")]
    MediaWaitTooLong { media_wait: String, timeout: String },

    #[error("Extractor is enabled but no program is configured")]
    MissingExtractorProgram,

    #[error("fetcher.max_artifact_bytes must be positive")]
    InvalidMaxArtifactBytes,

    #[error("server.concurrency_limit must be positive")]
    InvalidConcurrencyLimit,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_timeouts(config)?;
    validate_browser(config)?;
    validate_extractor(config)?;
    validate_budget(config)?;
    validate_fetcher(config)?;
    validate_server(config)?;
    Ok(())
}

fn require_positive(field: &str, value: HumanDuration) -> Result<(), ValidationError> {
    if value.as_duration().is_zero() {
        return Err(ValidationError::ZeroTimeout {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    require_positive("server.request_timeout", config.server.request_timeout)?;
    require_positive("providers.http_timeout", config.providers.http_timeout)?;
    require_positive("providers.probe_timeout", config.providers.probe_timeout)?;
    require_positive("providers.extractor.timeout", config.providers.extractor.timeout)?;
    require_positive("providers.browser.timeout", config.providers.browser.timeout)?;
    require_positive("providers.browser.media_wait", config.providers.browser.media_wait)?;
    require_positive("fetcher.download_timeout", config.fetcher.download_timeout)?;
    require_positive("fetcher.connect_timeout", config.fetcher.connect_timeout)?;
    Ok(())
}

fn validate_browser(config: &Config) -> Result<(), ValidationError> {
    let browser = &config.providers.browser;
    if browser.enabled && browser.media_wait >= browser.timeout {
        return Err(ValidationError::MediaWaitTooLong {
            media_wait: browser.media_wait.to_string(),
            timeout: browser.timeout.to_string(),
        });
    }
    Ok(())
}

fn validate_extractor(config: &Config) -> Result<(), ValidationError> {
    let extractor = &config.providers.extractor;
    if extractor.enabled && extractor.program.trim().is_empty() {
        return Err(ValidationError::MissingExtractorProgram);
    }
    Ok(())
}

/// Exhausting every provider must still finish inside the request timeout
fn validate_budget(config: &Config) -> Result<(), ValidationError> {
    let budget = config.server.request_timeout.as_duration();

    for platform in Platform::SUPPORTED {
        let worst_case = catalog::worst_case_latency(&config.providers, platform);
        if worst_case > budget {
            return Err(ValidationError::BudgetExceeded {
                platform,
                worst_case: HumanDuration(worst_case).to_string(),
                budget: config.server.request_timeout.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_fetcher(config: &Config) -> Result<(), ValidationError> {
    if config.fetcher.max_artifact_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxArtifactBytes);
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.concurrency_limit == 0 {
        return Err(ValidationError::InvalidConcurrencyLimit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_defaults_with_every_provider_fit_budget() {
        let mut config = Config::default();
        config.providers.rapidapi_key = Some("k".to_string());
        config.providers.browser.enabled = true;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.providers.http_timeout = HumanDuration::from_secs(0);

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::ZeroTimeout { field }) if field == "providers.http_timeout"
        ));
    }

    #[test]
    fn test_budget_exceeded() {
        let mut config = Config::default();
        config.server.request_timeout = HumanDuration::from_secs(30);

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::BudgetExceeded { platform: Platform::TikTok, .. })
        ));
    }

    #[test]
    fn test_disabling_providers_restores_budget() {
        let mut config = Config::default();
        config.server.request_timeout = HumanDuration::from_secs(60);
        config.providers.extractor.enabled = false;
        // TikTok keeps five 10s APIs; YouTube has no provider at all
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_media_wait_must_fit_browser_timeout() {
        let mut config = Config::default();
        config.providers.browser.enabled = true;
        config.providers.browser.media_wait = HumanDuration::from_secs(45);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MediaWaitTooLong { .. })
        ));
    }

    #[test]
    fn test_extractor_program_required_when_enabled() {
        let mut config = Config::default();
        config.providers.extractor.program = "  ".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingExtractorProgram)
        ));

        config.providers.extractor.enabled = false;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_artifact_limit_rejected() {
        let mut config = Config::default();
        config.fetcher.max_artifact_bytes = ByteSize(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMaxArtifactBytes)
        ));
    }
}
