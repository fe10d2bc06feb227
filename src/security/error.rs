//! Error taxonomy for the request-security engine.
//!
//! Two kinds of failure leave this subsystem:
//! - [`ValidationError`]: caller-supplied data has the wrong shape, length or
//!   scheme. Maps to a 400 response.
//! - [`SecurityError`]: a protection layer rejected the request. Carries a
//!   machine-readable [`SecurityErrorCode`] which decides the status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::rate_limit::RateLimitResult;

/// Field-level rejection of caller-supplied data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Name of the offending field, when known.
    pub field: Option<String>,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    /// Attach the name of the field that failed.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": "Validation failed",
            "field": self.field,
            "message": self.message,
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Closed set of security rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityErrorCode {
    RateLimitExceeded,
    CsrfTokenInvalid,
    OriginNotAllowed,
    InsecureTransport,
    MethodNotAllowed,
}

impl SecurityErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            SecurityErrorCode::CsrfTokenInvalid => "CSRF_TOKEN_INVALID",
            SecurityErrorCode::OriginNotAllowed => "ORIGIN_NOT_ALLOWED",
            SecurityErrorCode::InsecureTransport => "INSECURE_TRANSPORT",
            SecurityErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        }
    }

    /// HTTP status a rejection with this code is reported as.
    pub fn status(&self) -> StatusCode {
        match self {
            SecurityErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            SecurityErrorCode::CsrfTokenInvalid | SecurityErrorCode::OriginNotAllowed => {
                StatusCode::FORBIDDEN
            }
            SecurityErrorCode::InsecureTransport => StatusCode::BAD_REQUEST,
            SecurityErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl std::fmt::Display for SecurityErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protection layer refused the request.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct SecurityError {
    pub code: SecurityErrorCode,
    pub message: String,
    /// Present on `RATE_LIMIT_EXCEEDED`.
    pub rate_limit: Option<RateLimitResult>,
}

impl SecurityError {
    pub fn new(code: SecurityErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            rate_limit: None,
        }
    }

    pub fn rate_limited(result: RateLimitResult) -> Self {
        let message = format!(
            "Too many requests. Try again in {} seconds.",
            result.retry_after.unwrap_or(0)
        );
        Self {
            code: SecurityErrorCode::RateLimitExceeded,
            message,
            rate_limit: Some(result),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        self.code == SecurityErrorCode::RateLimitExceeded
    }
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        if let (true, Some(result)) = (self.is_rate_limit(), self.rate_limit.as_ref()) {
            return crate::rate_limit::middleware::too_many_requests(result, &self.message);
        }

        let body = json!({
            "error": self.code,
            "message": self.message,
        });
        (self.code.status(), Json(body)).into_response()
    }
}
