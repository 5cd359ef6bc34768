//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (addresses parse, limits > 0)
//! - Check that reserved paths are usable route segments
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderValue;
use std::net::SocketAddr;

use crate::config::schema::RouterConfig;
use crate::observability::logging::filter_from;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: `{value}` is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("docs.path `{0}` must be a single non-empty segment without `#` or `.`")]
    InvalidDocsPath(String),

    #[error("cors.origin `{0}` is not a valid header value")]
    InvalidOrigin(String),

    #[error("observability.log_level `{0}` is not a valid filter")]
    InvalidLogLevel(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.source.poll_interval_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "source.poll_interval_ms",
        });
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "limits.max_body_bytes",
        });
    }

    let docs_path = config.docs.path.trim_matches('/');
    if config.docs.enabled
        && (docs_path.is_empty() || docs_path.contains(['/', '.']) || docs_path.starts_with('#'))
    {
        errors.push(ValidationError::InvalidDocsPath(config.docs.path.clone()));
    }

    if config.cors.enabled && HeaderValue::from_str(&config.cors.origin).is_err() {
        errors.push(ValidationError::InvalidOrigin(config.cors.origin.clone()));
    }

    if filter_from(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
