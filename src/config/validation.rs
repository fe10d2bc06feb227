//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, limits > 0)
//! - Validate addresses parse before the listener binds
//! - Detect settings that would reject every request
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ShieldConfig → Result<(), Vec<ConfigValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{RateLimitSettings, ShieldConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ConfigValidationError {
    pub field: String,
    pub reason: String,
}

impl ConfigValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn check_limit(name: &str, settings: &RateLimitSettings, errors: &mut Vec<ConfigValidationError>) {
    if settings.window_ms == 0 {
        errors.push(ConfigValidationError::new(
            format!("rate_limits.{}.window_ms", name),
            "must be greater than zero",
        ));
    }
    if settings.max_requests == 0 {
        errors.push(ConfigValidationError::new(
            format!("rate_limits.{}.max_requests", name),
            "must be greater than zero",
        ));
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ShieldConfig) -> Result<(), Vec<ConfigValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ConfigValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ConfigValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let validation = &config.security.validation;
    if validation.validate_origin && validation.allowed_origins.is_empty() {
        errors.push(ConfigValidationError::new(
            "security.validation.allowed_origins",
            "origin validation is enabled but no origins are allowed",
        ));
    }
    if validation.max_input_length == 0 {
        errors.push(ConfigValidationError::new(
            "security.validation.max_input_length",
            "must be greater than zero",
        ));
    }
    for method in &validation.allowed_methods {
        if method.parse::<axum::http::Method>().is_err() {
            errors.push(ConfigValidationError::new(
                "security.validation.allowed_methods",
                format!("'{}' is not an HTTP method", method),
            ));
        }
    }

    let limits = &config.rate_limits;
    check_limit("auth", &limits.auth, &mut errors);
    check_limit("password_reset", &limits.password_reset, &mut errors);
    check_limit("sensitive", &limits.sensitive, &mut errors);
    check_limit("api", &limits.api, &mut errors);

    if config.store.sweep_interval_secs == 0 {
        errors.push(ConfigValidationError::new(
            "store.sweep_interval_secs",
            "must be greater than zero",
        ));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ConfigValidationError::new(
            "timeouts.request_secs",
            "must be greater than zero",
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ConfigValidationError::new(
            "admin.api_key",
            "admin API is enabled without a key",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
