//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check the bind address and log level are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: HttplogConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::HttplogConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &HttplogConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.capture.drain_max_bytes == Some(0) {
        errors.push(ValidationError::Zero("capture.drain_max_bytes"));
    }

    if config.capture.drain_timeout_ms == Some(0) {
        errors.push(ValidationError::Zero("capture.drain_timeout_ms"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&HttplogConfig::default()), Ok(()));
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = HttplogConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.observability.log_level = "loud".into();
        config.capture.drain_max_bytes = Some(0);
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("not-an-address".into()),
                ValidationError::LogLevel("loud".into()),
                ValidationError::Zero("capture.drain_max_bytes"),
                ValidationError::Zero("timeouts.request_secs"),
            ]
        );
    }
}
