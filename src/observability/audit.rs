//! Audit trail of security violations.
//!
//! Persistence lives outside this crate; the engine only reports through
//! [`AuditSink`]. The default sink writes structured `tracing` events on
//! the `audit` target so a subscriber can route them separately.

use std::net::IpAddr;

use axum::http::{header, request::Parts};
use serde::Serialize;
use serde_json::Value;

use crate::http::request::RequestIdExt;
use crate::security::error::SecurityErrorCode;
use crate::security::input::client_ip_for;

/// Kind of security event being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    RateLimitExceeded,
    CsrfViolation,
    OriginViolation,
    InsecureTransport,
    MethodNotAllowed,
    OpenRedirectAttempt,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::RateLimitExceeded => "rate_limit_exceeded",
            SecurityEventType::CsrfViolation => "csrf_violation",
            SecurityEventType::OriginViolation => "origin_violation",
            SecurityEventType::InsecureTransport => "insecure_transport",
            SecurityEventType::MethodNotAllowed => "method_not_allowed",
            SecurityEventType::OpenRedirectAttempt => "open_redirect_attempt",
        }
    }
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SecurityErrorCode> for SecurityEventType {
    fn from(code: SecurityErrorCode) -> Self {
        match code {
            SecurityErrorCode::RateLimitExceeded => SecurityEventType::RateLimitExceeded,
            SecurityErrorCode::CsrfTokenInvalid => SecurityEventType::CsrfViolation,
            SecurityErrorCode::OriginNotAllowed => SecurityEventType::OriginViolation,
            SecurityErrorCode::InsecureTransport => SecurityEventType::InsecureTransport,
            SecurityErrorCode::MethodNotAllowed => SecurityEventType::MethodNotAllowed,
        }
    }
}

/// Request facts attached to an audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditContext {
    pub request_id: Option<String>,
    pub client_ip: IpAddr,
    pub method: String,
    pub path: String,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_parts(parts: &Parts) -> Self {
        let read = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            request_id: parts.request_id().map(str::to_string),
            client_ip: client_ip_for(parts),
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            user_agent: read(header::USER_AGENT.as_str()),
        }
    }
}

/// Destination for security violation records.
pub trait AuditSink: Send + Sync {
    fn log_security_violation(
        &self,
        event: SecurityEventType,
        context: &AuditContext,
        message: &str,
        details: Value,
    );
}

/// Writes audit records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_security_violation(
        &self,
        event: SecurityEventType,
        context: &AuditContext,
        message: &str,
        details: Value,
    ) {
        tracing::warn!(
            target: "audit",
            event = %event,
            request_id = context.request_id.as_deref().unwrap_or("-"),
            client_ip = %context.client_ip,
            method = %context.method,
            path = %context.path,
            user_agent = context.user_agent.as_deref().unwrap_or("-"),
            details = %details,
            "{}",
            message
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that keeps every record in memory.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<(SecurityEventType, String)>>,
    }

    impl AuditSink for RecordingSink {
        fn log_security_violation(
            &self,
            event: SecurityEventType,
            _context: &AuditContext,
            message: &str,
            _details: Value,
        ) {
            self.events.lock().unwrap().push((event, message.to_string()));
        }
    }
}
