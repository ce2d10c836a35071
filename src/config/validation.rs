//! Configuration validation.
//!
//! Returns all validation errors, not just the first. Runs before the
//! config is handed to the client.

use thiserror::Error;

use crate::config::schema::ClientConfig;

/// Upper bound on configured retries.
const MAX_RETRIES_LIMIT: u32 = 10;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.api.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "api.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "api.base_url",
            format!("invalid URL '{}': {}", config.api.base_url, e),
        )),
    }

    if config.api.request_timeout_secs == 0 {
        errors.push(ValidationError::new("api.request_timeout_secs", "must be > 0"));
    }
    if config.api.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("api.connect_timeout_secs", "must be > 0"));
    }

    if config.retries.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::new(
            "retries.max_retries",
            format!("must be <= {}", MAX_RETRIES_LIMIT),
        ));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.refresh.timeout_secs == 0 {
        errors.push(ValidationError::new("refresh.timeout_secs", "must be > 0"));
    }

    if config.session.key.trim().is_empty() {
        errors.push(ValidationError::new("session.key", "must not be empty"));
    }
    if config.session.path.trim().is_empty() {
        errors.push(ValidationError::new("session.path", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
