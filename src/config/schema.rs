//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the shield.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};

use crate::rate_limit::presets;
use crate::security::context::SecurityValidationOptions;

/// Root configuration for the auth shield.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShieldConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deployment mode; production enables the secure-transport check.
    pub environment: Environment,

    /// Request validation and hardening.
    pub security: SecurityConfig,

    /// Per-endpoint rate limits.
    pub rate_limits: RateLimitPresets,

    /// Rate-limit store housekeeping.
    pub store: StoreConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Accounts accepted by the reference sign-in endpoint.
    pub users: Vec<UserCredential>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Transport / origin / CSRF checks for state-changing auth routes.
    pub validation: SecurityValidationOptions,
    /// Honour `x-forwarded-proto` from a TLS-terminating proxy.
    pub trust_forwarded_proto: bool,
    /// Honour `x-user-id` from an upstream authenticator. Leave off unless
    /// that proxy strips the header from client requests.
    pub trust_user_header: bool,
    /// Add the standard security response headers.
    pub enable_headers: bool,
    /// Classify User-Agents against the bot pattern list.
    pub bot_detection: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            validation: SecurityValidationOptions::default(),
            trust_forwarded_proto: true,
            trust_user_header: false,
            enable_headers: true,
            bot_detection: true,
            max_body_size: 64 * 1024,
        }
    }
}

/// Settings for one fixed-window limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitSettings {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Let handlers clear the counter after a successful authentication.
    #[serde(default)]
    pub skip_successful_requests: bool,
}

/// Limits for each protected endpoint family.
///
/// A table only needs the keys it changes; the rest come from the
/// matching preset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitPresets {
    #[serde(deserialize_with = "auth_settings")]
    pub auth: RateLimitSettings,
    #[serde(deserialize_with = "password_reset_settings")]
    pub password_reset: RateLimitSettings,
    #[serde(deserialize_with = "sensitive_settings")]
    pub sensitive: RateLimitSettings,
    #[serde(deserialize_with = "api_settings")]
    pub api: RateLimitSettings,
}

#[derive(Deserialize)]
struct RateLimitOverrides {
    window_ms: Option<u64>,
    max_requests: Option<u32>,
    skip_successful_requests: Option<bool>,
}

fn overlay<'de, D>(deserializer: D, base: RateLimitSettings) -> Result<RateLimitSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = RateLimitOverrides::deserialize(deserializer)?;
    Ok(RateLimitSettings {
        window_ms: overrides.window_ms.unwrap_or(base.window_ms),
        max_requests: overrides.max_requests.unwrap_or(base.max_requests),
        skip_successful_requests: overrides
            .skip_successful_requests
            .unwrap_or(base.skip_successful_requests),
    })
}

fn auth_settings<'de, D: Deserializer<'de>>(d: D) -> Result<RateLimitSettings, D::Error> {
    overlay(d, presets::AUTH_ATTEMPTS)
}

fn password_reset_settings<'de, D: Deserializer<'de>>(d: D) -> Result<RateLimitSettings, D::Error> {
    overlay(d, presets::PASSWORD_RESET)
}

fn sensitive_settings<'de, D: Deserializer<'de>>(d: D) -> Result<RateLimitSettings, D::Error> {
    overlay(d, presets::SENSITIVE_OPERATIONS)
}

fn api_settings<'de, D: Deserializer<'de>>(d: D) -> Result<RateLimitSettings, D::Error> {
    overlay(d, presets::GENERAL_API)
}

impl Default for RateLimitPresets {
    fn default() -> Self {
        Self {
            auth: presets::AUTH_ATTEMPTS,
            password_reset: presets::PASSWORD_RESET,
            sensitive: presets::SENSITIVE_OPERATIONS,
            api: presets::GENERAL_API,
        }
    }
}

/// Rate-limit store housekeeping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Interval between sweeps of expired entries, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Address for the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "auth_shield=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,
    /// Bearer key required on every admin call.
    pub api_key: String,
}

/// An account accepted by the reference sign-in endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserCredential {
    pub email: String,
    pub password: String,
    /// Identifier attached to the session; defaults to the email.
    #[serde(default)]
    pub user_id: Option<String>,
}
