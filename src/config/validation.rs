use crate::config::types::{Config, CrawlerConfig, EndpointConfig, OutputConfig, RetryConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_endpoint_config(&config.endpoint)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 500 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 500, got {}",
            config.workers
        )));
    }

    // 0 and 1 are seeded complete and max-results truncated, so they must differ
    if config.max_results < 2 {
        return Err(ConfigError::Validation(format!(
            "max-results must be >= 2, got {}",
            config.max_results
        )));
    }

    for (name, value) in [
        ("staging-threshold", config.staging_threshold),
        ("staging-batch-size", config.staging_batch_size),
        ("bulk-batch-size", config.bulk_batch_size),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    if config.confirmation_threshold < 1 {
        return Err(ConfigError::Validation(
            "confirmation-threshold must be >= 1".to_string(),
        ));
    }

    validate_alphabet("first-level-alphabet", &config.first_level_alphabet)?;
    validate_alphabet("narrowing-alphabet", &config.narrowing_alphabet)?;

    for term in &config.presplit_terms {
        let mut chars = term.chars();
        let is_first_level = match (chars.next(), chars.next()) {
            (Some(c), None) => config.first_level_alphabet.contains(c),
            _ => false,
        };
        if !is_first_level {
            return Err(ConfigError::Validation(format!(
                "presplit term '{}' is not a character of the first-level alphabet",
                term
            )));
        }
    }

    validate_static_rule(config)?;

    Ok(())
}

/// Validates the optional static truncation rule against max-results
fn validate_static_rule(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if let Some(through) = config.complete_through {
        if through >= config.max_results {
            return Err(ConfigError::Validation(format!(
                "complete-through ({}) must be below max-results ({})",
                through, config.max_results
            )));
        }
    }

    if let Some(from) = config.truncated_from {
        if from > config.max_results {
            return Err(ConfigError::Validation(format!(
                "truncated-from ({}) must not exceed max-results ({})",
                from, config.max_results
            )));
        }
        if from < 2 {
            return Err(ConfigError::Validation(format!(
                "truncated-from must be >= 2, got {}",
                from
            )));
        }
    }

    if let (Some(through), Some(from)) = (config.complete_through, config.truncated_from) {
        if through >= from {
            return Err(ConfigError::Validation(format!(
                "complete-through ({}) must be below truncated-from ({})",
                through, from
            )));
        }
    }

    Ok(())
}

/// Validates an alphabet: non-empty, no whitespace
fn validate_alphabet(name: &str, alphabet: &str) -> Result<(), ConfigError> {
    if alphabet.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }

    if alphabet.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "{} cannot contain whitespace",
            name
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.backoff_base_secs < 1 {
        return Err(ConfigError::Validation(
            "backoff-base-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates endpoint configuration
fn validate_endpoint_config(config: &EndpointConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint url '{}' must use http or https",
            config.url
        )));
    }

    if config.term_param.is_empty() {
        return Err(ConfigError::Validation(
            "term-param cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.export_path.is_empty() {
        return Err(ConfigError::Validation(
            "export-path cannot be empty".to_string(),
        ));
    }

    if config.snapshot_every < 1 {
        return Err(ConfigError::Validation(
            "snapshot-every must be >= 1".to_string(),
        ));
    }

    if config.keep_snapshots < 1 {
        return Err(ConfigError::Validation(
            "keep-snapshots must be >= 1".to_string(),
        ));
    }

    Ok(())
}
