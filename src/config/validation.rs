use super::{AppConfig, ConfigError};

const VALID_LOG_LEVELS: &[&str] = &[
    "DISABLED", "TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR", "CRITICAL",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream_config(config)?;
    validate_generation_config(config)?;
    validate_model_table(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.max_body_bytes == 0 {
        return Err(validation_err("server.max_body_bytes must be greater than 0"));
    }
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_upstream_config(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    if !upstream.base_url.starts_with("http://") && !upstream.base_url.starts_with("https://") {
        return Err(validation_err(
            "upstream.base_url must start with http:// or https://",
        ));
    }
    if url::Url::parse(&upstream.base_url).is_err() {
        return Err(validation_err(format!(
            "upstream.base_url '{}' is not a valid URL",
            upstream.base_url
        )));
    }
    if upstream.api_key.trim().is_empty() {
        return Err(validation_err(
            "upstream.api_key cannot be empty (set UPSTREAM_API_KEY)",
        ));
    }
    Ok(())
}

fn validate_generation_config(config: &AppConfig) -> Result<(), ConfigError> {
    let generation = &config.generation;
    if generation.min_tokens == 0 {
        return Err(validation_err("generation.min_tokens must be greater than 0"));
    }
    if generation.min_tokens > generation.max_tokens {
        return Err(validation_err(format!(
            "generation.min_tokens ({}) must not exceed generation.max_tokens ({})",
            generation.min_tokens, generation.max_tokens
        )));
    }
    if !(0.0..=2.0).contains(&generation.default_temperature) {
        return Err(validation_err(
            "generation.default_temperature must be within [0, 2]",
        ));
    }
    if let Some(directive) = generation.system_directive.as_deref() {
        if directive.trim().is_empty() {
            return Err(validation_err(
                "generation.system_directive cannot be blank when set",
            ));
        }
    }
    Ok(())
}

fn validate_model_table(config: &AppConfig) -> Result<(), ConfigError> {
    for (public, upstream) in &config.models {
        if public.trim().is_empty() || upstream.trim().is_empty() {
            return Err(validation_err(format!(
                "models: entry '{public}' -> '{upstream}' has an empty side"
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level '{}' must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
