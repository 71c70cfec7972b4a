use crate::config::types::{Config, CrawlerConfig, OutputConfig, SeedEntry, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
///
/// Also used by [`crate::crawler::Coordinator::new`] for options built in code.
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.fetch_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch_retries must be >= 1, got {}",
            config.fetch_retries
        )));
    }

    if config.fetch_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_max_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be greater than zero when set".to_string(),
        ));
    }

    if config.progress_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "progress_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.dataset_dir.is_empty() {
        return Err(ConfigError::Validation(
            "dataset_dir cannot be empty".to_string(),
        ));
    }

    if matches!(&config.summary_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed entries
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[seed]] entry is required".to_string(),
        ));
    }

    for seed in seeds {
        let url = Url::parse(&seed.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use the http or https scheme",
                seed.url
            )));
        }
    }

    Ok(())
}
