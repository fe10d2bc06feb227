//! Listeners notified when a limiter denies a request.
//!
//! Observers are side channels (logs, metrics, audit). A failing or
//! panicking observer is logged and skipped; it never changes the decision.

use std::sync::Arc;

use axum::http::request::Parts;
use serde_json::json;

use crate::observability::audit::{AuditContext, AuditSink, SecurityEventType};
use crate::observability::metrics;
use crate::rate_limit::limiter::{RateLimitConfig, RateLimitResult};

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// A denied request, as seen by observers.
#[derive(Debug)]
pub struct LimitEvent<'a> {
    pub key: &'a str,
    pub config: &'a RateLimitConfig,
    pub result: &'a RateLimitResult,
    /// Request that triggered the denial, when checked from a request.
    pub parts: Option<&'a Parts>,
}

pub trait LimitObserver: Send + Sync {
    fn on_limit_reached(&self, event: &LimitEvent<'_>) -> Result<(), ObserverError>;
}

/// Logs each denial at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LimitObserver for TracingObserver {
    fn on_limit_reached(&self, event: &LimitEvent<'_>) -> Result<(), ObserverError> {
        tracing::warn!(
            limiter = %event.config.name,
            key = %event.key,
            limit = event.result.limit,
            retry_after = event.result.retry_after.unwrap_or(0),
            "Rate limit exceeded"
        );
        Ok(())
    }
}

/// Counts denials per limiter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl LimitObserver for MetricsObserver {
    fn on_limit_reached(&self, event: &LimitEvent<'_>) -> Result<(), ObserverError> {
        metrics::record_rate_limited(&event.config.name);
        Ok(())
    }
}

/// Forwards denials to an [`AuditSink`].
#[derive(Clone)]
pub struct AuditObserver {
    sink: Arc<dyn AuditSink>,
}

impl AuditObserver {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

impl LimitObserver for AuditObserver {
    fn on_limit_reached(&self, event: &LimitEvent<'_>) -> Result<(), ObserverError> {
        let Some(parts) = event.parts else {
            return Ok(());
        };
        self.sink.log_security_violation(
            SecurityEventType::RateLimitExceeded,
            &AuditContext::from_parts(parts),
            "Rate limit exceeded",
            json!({
                "limiter": event.config.name,
                "key": event.key,
                "limit": event.result.limit,
                "retryAfter": event.result.retry_after,
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::audit::testing::RecordingSink;
    use axum::http::Request;
    use std::time::Duration;

    #[test]
    fn test_audit_observer_needs_request() {
        let sink = Arc::new(RecordingSink::default());
        let observer = AuditObserver::new(sink.clone());
        let config = RateLimitConfig::new("auth", Duration::from_secs(1), 1);
        let result = RateLimitResult {
            success: false,
            limit: 1,
            remaining: 0,
            reset_time: 1_000,
            retry_after: Some(1),
        };

        let detached = LimitEvent { key: "auth:ip:1.2.3.4", config: &config, result: &result, parts: None };
        observer.on_limit_reached(&detached).unwrap();
        assert!(sink.events.lock().unwrap().is_empty());

        let (parts, _) = Request::post("/auth/sign-in").body(()).unwrap().into_parts();
        let attached = LimitEvent { parts: Some(&parts), ..detached };
        observer.on_limit_reached(&attached).unwrap();
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, SecurityEventType::RateLimitExceeded);
    }
}
