//! Fixed-window rate limiting over a [`RateLimitStore`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RateLimitSettings;
use crate::observability::metrics;
use crate::rate_limit::clock::{datetime_from_ms, iso_from_ms, Clock};
use crate::rate_limit::keys::{IpKey, KeyExtractor};
use crate::rate_limit::observer::{LimitEvent, LimitObserver};
use crate::rate_limit::store::{RateLimitEntry, RateLimitStore};
use crate::security::error::SecurityError;

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the current window closes.
    pub reset_time: u64,
    /// Whole seconds until the window closes. Only set on denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl RateLimitResult {
    pub fn reset_at(&self) -> DateTime<Utc> {
        datetime_from_ms(self.reset_time)
    }

    /// `reset_time` as an RFC 3339 timestamp with millisecond precision.
    pub fn reset_iso(&self) -> String {
        iso_from_ms(self.reset_time)
    }
}

/// Parameters of one named limiter.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Namespaces the limiter's keys in a shared store.
    pub name: String,
    pub window: Duration,
    pub max_requests: u32,
    /// Whether a handler may clear the counter after a successful request.
    pub skip_successful_requests: bool,
    /// Falls back to [`IpKey`] when unset.
    pub key_extractor: Option<Arc<dyn KeyExtractor>>,
}

impl RateLimitConfig {
    pub fn new(name: impl Into<String>, window: Duration, max_requests: u32) -> Self {
        Self {
            name: name.into(),
            window,
            max_requests,
            skip_successful_requests: false,
            key_extractor: None,
        }
    }

    pub fn from_settings(name: impl Into<String>, settings: &RateLimitSettings) -> Self {
        Self::new(name, Duration::from_millis(settings.window_ms), settings.max_requests)
            .skip_successful_requests(settings.skip_successful_requests)
    }

    pub fn with_key_extractor(mut self, extractor: impl KeyExtractor + 'static) -> Self {
        self.key_extractor = Some(Arc::new(extractor));
        self
    }

    pub fn skip_successful_requests(mut self, skip: bool) -> Self {
        self.skip_successful_requests = skip;
        self
    }

    pub fn settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            window_ms: self.window.as_millis() as u64,
            max_requests: self.max_requests,
            skip_successful_requests: self.skip_successful_requests,
        }
    }
}

impl fmt::Debug for RateLimitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitConfig")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("skip_successful_requests", &self.skip_successful_requests)
            .field("custom_key", &self.key_extractor.is_some())
            .finish()
    }
}

/// Checks requests against named fixed-window limits.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    observers: Vec<Arc<dyn LimitObserver>>,
}

impl RateLimiter {
    /// `clock` must be the clock the store measures windows with.
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LimitObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    /// Stored key for a request: `<limiter name>:<extracted key>`.
    ///
    /// `custom` wins over the config's extractor, which wins over [`IpKey`].
    pub fn derive_key(
        &self,
        parts: &Parts,
        config: &RateLimitConfig,
        custom: Option<&dyn KeyExtractor>,
    ) -> String {
        let raw = if let Some(extractor) = custom {
            extractor.key(parts)
        } else if let Some(extractor) = &config.key_extractor {
            extractor.key(parts)
        } else {
            IpKey.key(parts)
        };
        scoped_key(config, &raw)
    }

    /// Count this request and report whether it is within the limit.
    pub fn check_rate_limit(
        &self,
        parts: &Parts,
        config: &RateLimitConfig,
        custom: Option<&dyn KeyExtractor>,
    ) -> RateLimitResult {
        let key = self.derive_key(parts, config, custom);
        self.evaluate(&key, config, Some(parts))
    }

    /// Like [`check_rate_limit`](Self::check_rate_limit), but a denial is an error.
    pub fn enforce_rate_limit(
        &self,
        parts: &Parts,
        config: &RateLimitConfig,
        custom: Option<&dyn KeyExtractor>,
    ) -> Result<RateLimitResult, SecurityError> {
        into_enforced(self.check_rate_limit(parts, config, custom))
    }

    /// Count one hit against an already-extracted key (unscoped).
    pub fn check_key(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        self.evaluate(&scoped_key(config, key), config, None)
    }

    pub fn enforce_key(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, SecurityError> {
        into_enforced(self.check_key(key, config))
    }

    /// Forget this request's counter. No-op unless the limiter skips
    /// successful requests. Returns whether anything was cleared.
    pub fn clear_rate_limit(
        &self,
        parts: &Parts,
        config: &RateLimitConfig,
        custom: Option<&dyn KeyExtractor>,
    ) -> bool {
        let key = self.derive_key(parts, config, custom);
        self.clear_scoped(&key, config)
    }

    /// [`clear_rate_limit`](Self::clear_rate_limit) for an unscoped key.
    pub fn clear_key(&self, key: &str, config: &RateLimitConfig) -> bool {
        self.clear_scoped(&scoped_key(config, key), config)
    }

    /// Current entry for a stored (scoped) key, without counting.
    pub fn peek(&self, stored_key: &str) -> Option<RateLimitEntry> {
        self.store.get(stored_key)
    }

    /// Drop a stored (scoped) key regardless of limiter settings.
    pub fn reset(&self, stored_key: &str) {
        self.store.reset(stored_key);
    }

    pub(crate) fn clear_scoped(&self, stored_key: &str, config: &RateLimitConfig) -> bool {
        if !config.skip_successful_requests {
            return false;
        }
        self.store.reset(stored_key);
        tracing::debug!(limiter = %config.name, key = %stored_key, "Rate-limit counter cleared");
        true
    }

    pub(crate) fn evaluate(
        &self,
        stored_key: &str,
        config: &RateLimitConfig,
        parts: Option<&Parts>,
    ) -> RateLimitResult {
        let entry = self.store.increment(stored_key, config.window);
        let success = entry.count <= config.max_requests;

        let retry_after = (!success).then(|| {
            let left_ms = entry.reset_time.saturating_sub(self.clock.now_ms());
            left_ms.div_ceil(1000).max(1)
        });

        let result = RateLimitResult {
            success,
            limit: config.max_requests,
            remaining: config.max_requests.saturating_sub(entry.count),
            reset_time: entry.reset_time,
            retry_after,
        };

        metrics::record_rate_limit_check(&config.name, success);
        if !success {
            self.notify(&LimitEvent {
                key: stored_key,
                config,
                result: &result,
                parts,
            });
        }
        result
    }

    fn notify(&self, event: &LimitEvent<'_>) {
        for observer in &self.observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_limit_reached(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(limiter = %event.config.name, error = %e, "Limit observer failed");
                }
                Err(_) => {
                    tracing::error!(limiter = %event.config.name, "Limit observer panicked");
                }
            }
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("entries", &self.store.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn scoped_key(config: &RateLimitConfig, raw: &str) -> String {
    format!("{}:{}", config.name, raw)
}

fn into_enforced(result: RateLimitResult) -> Result<RateLimitResult, SecurityError> {
    if result.success {
        Ok(result)
    } else {
        Err(SecurityError::rate_limited(result))
    }
}
