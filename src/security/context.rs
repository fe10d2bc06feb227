//! Per-request security context validation.
//!
//! # Data Flow
//! ```text
//! request parts
//!     → transport check   (production only: HTTPS or trusted x-forwarded-proto)
//!     → origin check      (Origin / Referer against allow-list)
//!     → CSRF check        (POST/PUT/DELETE/PATCH only, double-submit token)
//!     → method check      (optional allow-list)
//!     → downstream
//! ```
//!
//! Checks run in this fixed order; the first failure short-circuits the rest.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{request::Parts, uri::Scheme, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::schema::Environment;
use crate::observability::audit::{AuditContext, AuditSink, SecurityEventType};
use crate::observability::metrics;
use crate::security::constants::{FORWARDED_PROTO_HEADER, MAX_INPUT_LENGTH};
use crate::security::csrf::CsrfTokenService;
use crate::security::error::{SecurityError, SecurityErrorCode, ValidationError};
use crate::security::input::sanitize_input_with_limit;
use crate::security::origin::validate_origin;

/// Options controlling which checks run for a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityValidationOptions {
    pub require_csrf: bool,
    pub validate_origin: bool,
    pub allowed_origins: Vec<String>,
    pub max_input_length: usize,
    pub require_secure_transport: bool,
    /// Methods accepted on protected routes; empty accepts any.
    pub allowed_methods: Vec<String>,
}

impl Default for SecurityValidationOptions {
    fn default() -> Self {
        Self {
            require_csrf: true,
            validate_origin: false,
            allowed_origins: Vec::new(),
            max_input_length: MAX_INPUT_LENGTH,
            require_secure_transport: true,
            allowed_methods: Vec::new(),
        }
    }
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

/// Orchestrates transport, origin and CSRF checks for one request.
#[derive(Debug, Clone)]
pub struct SecurityContextValidator {
    options: SecurityValidationOptions,
    environment: Environment,
    trust_forwarded_proto: bool,
    csrf: CsrfTokenService,
}

impl SecurityContextValidator {
    pub fn new(
        options: SecurityValidationOptions,
        environment: Environment,
        trust_forwarded_proto: bool,
    ) -> Self {
        Self {
            options,
            environment,
            trust_forwarded_proto,
            csrf: CsrfTokenService::new(environment.is_production()),
        }
    }

    pub fn options(&self) -> &SecurityValidationOptions {
        &self.options
    }

    pub fn csrf(&self) -> &CsrfTokenService {
        &self.csrf
    }

    fn is_secure(&self, parts: &Parts) -> bool {
        if parts.uri.scheme() == Some(&Scheme::HTTPS) {
            return true;
        }
        self.trust_forwarded_proto
            && parts
                .headers
                .get(FORWARDED_PROTO_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
                .unwrap_or(false)
    }

    /// Run every enabled check in order.
    pub fn validate(&self, parts: &Parts) -> Result<(), SecurityError> {
        if self.options.require_secure_transport
            && self.environment.is_production()
            && !self.is_secure(parts)
        {
            return Err(SecurityError::new(
                SecurityErrorCode::InsecureTransport,
                "HTTPS is required",
            ));
        }

        if self.options.validate_origin
            && !validate_origin(&parts.headers, &self.options.allowed_origins)
        {
            return Err(SecurityError::new(
                SecurityErrorCode::OriginNotAllowed,
                "Request origin is not allowed",
            ));
        }

        if self.options.require_csrf
            && is_state_changing(&parts.method)
            && !self.csrf.verify_request(parts)
        {
            return Err(SecurityError::new(
                SecurityErrorCode::CsrfTokenInvalid,
                "Missing or invalid CSRF token",
            ));
        }

        if !self.options.allowed_methods.is_empty()
            && !self
                .options
                .allowed_methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(parts.method.as_str()))
        {
            return Err(SecurityError::new(
                SecurityErrorCode::MethodNotAllowed,
                format!("Method {} is not allowed", parts.method),
            ));
        }

        Ok(())
    }

    /// Sanitize free text with the configured length ceiling.
    pub fn sanitize(&self, raw: &str) -> Result<String, ValidationError> {
        sanitize_input_with_limit(raw, self.options.max_input_length)
    }
}

/// State for [`security_context_middleware`].
#[derive(Clone)]
pub struct SecurityContextState {
    pub validator: Arc<SecurityContextValidator>,
    pub audit: Arc<dyn AuditSink>,
}

/// Middleware applying [`SecurityContextValidator`] before the handler runs.
pub async fn security_context_middleware(
    State(state): State<SecurityContextState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    if let Err(err) = state.validator.validate(&parts) {
        tracing::warn!(
            code = %err.code,
            method = %parts.method,
            path = %parts.uri.path(),
            "Request rejected by security context"
        );
        metrics::record_security_rejection(err.code);
        state.audit.log_security_violation(
            SecurityEventType::from(err.code),
            &AuditContext::from_parts(&parts),
            &err.message,
            json!({ "code": err.code }),
        );
        return err.into_response();
    }

    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::constants::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME};
    use axum::http::{header, Request};

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    fn validator(options: SecurityValidationOptions, env: Environment) -> SecurityContextValidator {
        SecurityContextValidator::new(options, env, true)
    }

    #[test]
    fn test_transport_only_enforced_in_production() {
        let options = SecurityValidationOptions {
            require_csrf: false,
            ..Default::default()
        };
        let req = parts(Request::get("http://example.com/"));

        assert!(validator(options.clone(), Environment::Development).validate(&req).is_ok());

        let err = validator(options.clone(), Environment::Production)
            .validate(&req)
            .unwrap_err();
        assert_eq!(err.code, SecurityErrorCode::InsecureTransport);

        let forwarded = parts(Request::get("/").header(FORWARDED_PROTO_HEADER, "HTTPS"));
        assert!(validator(options.clone(), Environment::Production).validate(&forwarded).is_ok());

        let untrusted = SecurityContextValidator::new(options, Environment::Production, false);
        assert!(untrusted.validate(&forwarded).is_err());
    }

    #[test]
    fn test_check_order_transport_before_origin_before_csrf() {
        let options = SecurityValidationOptions {
            validate_origin: true,
            allowed_origins: vec!["good.com".into()],
            ..Default::default()
        };
        let v = validator(options, Environment::Production);

        let req = parts(Request::post("http://good.com/x").header(header::ORIGIN, "https://evil.com"));
        assert_eq!(v.validate(&req).unwrap_err().code, SecurityErrorCode::InsecureTransport);

        let req = parts(
            Request::post("https://good.com/x").header(header::ORIGIN, "https://evil.com"),
        );
        assert_eq!(v.validate(&req).unwrap_err().code, SecurityErrorCode::OriginNotAllowed);

        let req = parts(
            Request::post("https://good.com/x").header(header::ORIGIN, "https://good.com"),
        );
        assert_eq!(v.validate(&req).unwrap_err().code, SecurityErrorCode::CsrfTokenInvalid);
    }

    #[test]
    fn test_csrf_only_for_state_changing_methods() {
        let v = validator(SecurityValidationOptions::default(), Environment::Development);
        assert!(v.validate(&parts(Request::get("/auth/csrf"))).is_ok());
        assert!(v.validate(&parts(Request::head("/auth/csrf"))).is_ok());
        for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
            let req = parts(Request::builder().method(method).uri("/auth/sign-in"));
            assert_eq!(v.validate(&req).unwrap_err().code, SecurityErrorCode::CsrfTokenInvalid);
        }

        let token = v.csrf().issue();
        let req = parts(
            Request::post("/auth/sign-in")
                .header(CSRF_HEADER_NAME, token.as_str())
                .header(header::COOKIE, format!("{}={}", CSRF_COOKIE_NAME, token)),
        );
        assert!(v.validate(&req).is_ok());
    }

    #[test]
    fn test_method_allow_list() {
        let options = SecurityValidationOptions {
            require_csrf: false,
            allowed_methods: vec!["get".into(), "POST".into()],
            ..Default::default()
        };
        let v = validator(options, Environment::Development);
        assert!(v.validate(&parts(Request::post("/"))).is_ok());
        let err = v.validate(&parts(Request::delete("/"))).unwrap_err();
        assert_eq!(err.code, SecurityErrorCode::MethodNotAllowed);
    }

    #[test]
    fn test_sanitize_uses_configured_limit() {
        let options = SecurityValidationOptions {
            max_input_length: 4,
            ..Default::default()
        };
        let v = validator(options, Environment::Development);
        assert_eq!(v.sanitize("<ab>").unwrap(), "ab");
        assert!(v.sanitize("abcde").is_err());
    }
}
