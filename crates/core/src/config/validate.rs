use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Worker pools are not empty
/// - Timeouts, when set, are at least one second
/// - Registry URLs and credentials are present when a registry is configured
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.staging.processor.workers == 0 {
        return Err(ConfigError::ValidationError(
            "staging.workers cannot be 0".to_string(),
        ));
    }

    if config.reconcile.workers == 0 {
        return Err(ConfigError::ValidationError(
            "reconcile.workers cannot be 0".to_string(),
        ));
    }

    if config.reconcile.call_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reconcile.call_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.staging.processor.row_timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "staging.row_timeout_secs cannot be 0".to_string(),
        ));
    }

    if let Some(registry) = &config.registry {
        if registry.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "registry.timeout_secs cannot be 0".to_string(),
            ));
        }
        if !registry.base_url.starts_with("http://") && !registry.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "registry.base_url must be an http(s) URL, got '{}'",
                registry.base_url
            )));
        }
        if registry.username.is_empty() {
            return Err(ConfigError::ValidationError(
                "registry.username cannot be empty".to_string(),
            ));
        }
    }

    if config.transfer.program.is_empty() {
        return Err(ConfigError::ValidationError(
            "transfer.program cannot be empty".to_string(),
        ));
    }

    Ok(())
}
