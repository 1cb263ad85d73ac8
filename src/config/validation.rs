//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check TLS and redirect settings are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `listener.bind_address`).
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

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{}' is not a valid socket address", value),
        ));
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
        if let Some(redirect) = &tls.redirect_address {
            check_addr(&mut errors, "listener.tls.redirect_address", redirect);
        }
        if !tls.redirect_origin.starts_with("https://") {
            errors.push(ValidationError::new(
                "listener.tls.redirect_origin",
                "must start with https://",
            ));
        }
    }

    let ext = &config.assets.extension;
    if ext.is_empty() {
        errors.push(ValidationError::new("assets.extension", "must not be empty"));
    } else if ext.contains(['/', '\\']) || ext.starts_with('.') {
        errors.push(ValidationError::new(
            "assets.extension",
            "must be a bare extension without separators or leading dot",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
