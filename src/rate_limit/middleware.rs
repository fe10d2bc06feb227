//! Rate limiting as an axum middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::observability::perf::{MetricsCollector, PerformanceCollector};
use crate::rate_limit::limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
use crate::security::error::SecurityError;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// State for one rate-limited route group.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<RateLimitConfig>,
    pub perf: Arc<dyn PerformanceCollector>,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>, config: RateLimitConfig) -> Self {
        Self {
            limiter,
            config: Arc::new(config),
            perf: Arc::new(MetricsCollector),
        }
    }

    pub fn with_perf(mut self, perf: Arc<dyn PerformanceCollector>) -> Self {
        self.perf = perf;
        self
    }
}

/// Handle to the counter a request was charged against.
///
/// Inserted into request extensions by [`rate_limit_middleware`]; handlers
/// call [`clear`](Self::clear) after a successful sign-in.
#[derive(Clone)]
pub struct RateLimitTicket {
    limiter: Arc<RateLimiter>,
    config: Arc<RateLimitConfig>,
    key: String,
    result: RateLimitResult,
}

impl RateLimitTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn result(&self) -> &RateLimitResult {
        &self.result
    }

    /// Forget the counter if the limiter skips successful requests.
    pub fn clear(&self) -> bool {
        self.limiter.clear_scoped(&self.key, &self.config)
    }
}

/// Count the request; reject with 429 once the window's quota is spent.
///
/// Allowed responses carry `X-RateLimit-*` headers.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let key = state.limiter.derive_key(&parts, &state.config, None);
    let timer = state.perf.start_operation("rate_limit.check", &key);

    let result = state.limiter.evaluate(&key, &state.config, Some(&parts));
    if !result.success {
        timer.error("limit exceeded");
        return SecurityError::rate_limited(result).into_response();
    }
    timer.success();

    parts.extensions.insert(RateLimitTicket {
        limiter: state.limiter.clone(),
        config: state.config.clone(),
        key,
        result: result.clone(),
    });

    let mut response = next.run(Request::from_parts(parts, body)).await;
    apply_rate_limit_headers(response.headers_mut(), &result);
    response
}

/// Set `X-RateLimit-Limit`, `-Remaining` and `-Reset` (RFC 3339).
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    if let Ok(reset) = HeaderValue::from_str(&result.reset_iso()) {
        headers.insert(X_RATELIMIT_RESET, reset);
    }
}

/// The 429 response for a denied request.
pub fn too_many_requests(result: &RateLimitResult, message: &str) -> Response {
    let retry_after = result.retry_after.unwrap_or(0);
    let body = json!({
        "error": "Rate limit exceeded",
        "message": message,
        "retryAfter": retry_after,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    apply_rate_limit_headers(headers, result);
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
