//! Stock limits for common endpoint families.
//!
//! | preset                 | window | max | key          |
//! |------------------------|--------|-----|--------------|
//! | `AUTH_ATTEMPTS`        | 15 min | 20  | client IP    |
//! | `PASSWORD_RESET`       | 1 h    | 5   | email or IP  |
//! | `SENSITIVE_OPERATIONS` | 1 h    | 3   | user or IP   |
//! | `GENERAL_API`          | 15 min | 100 | client IP    |

use crate::config::RateLimitSettings;
use crate::rate_limit::keys::{EmailOrIpKey, IpKey, UserOrIpKey};
use crate::rate_limit::limiter::RateLimitConfig;

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

pub const AUTH_ATTEMPTS: RateLimitSettings = RateLimitSettings {
    window_ms: 15 * MINUTE_MS,
    max_requests: 20,
    skip_successful_requests: true,
};

pub const PASSWORD_RESET: RateLimitSettings = RateLimitSettings {
    window_ms: HOUR_MS,
    max_requests: 5,
    skip_successful_requests: false,
};

pub const SENSITIVE_OPERATIONS: RateLimitSettings = RateLimitSettings {
    window_ms: HOUR_MS,
    max_requests: 3,
    skip_successful_requests: false,
};

pub const GENERAL_API: RateLimitSettings = RateLimitSettings {
    window_ms: 15 * MINUTE_MS,
    max_requests: 100,
    skip_successful_requests: false,
};

pub fn auth_attempts(settings: &RateLimitSettings) -> RateLimitConfig {
    RateLimitConfig::from_settings("auth", settings).with_key_extractor(IpKey)
}

pub fn password_reset(settings: &RateLimitSettings) -> RateLimitConfig {
    RateLimitConfig::from_settings("password_reset", settings).with_key_extractor(EmailOrIpKey)
}

pub fn sensitive_operations(settings: &RateLimitSettings) -> RateLimitConfig {
    RateLimitConfig::from_settings("sensitive", settings).with_key_extractor(UserOrIpKey)
}

pub fn general_api(settings: &RateLimitSettings) -> RateLimitConfig {
    RateLimitConfig::from_settings("api", settings).with_key_extractor(IpKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_preset_windows() {
        let auth = auth_attempts(&AUTH_ATTEMPTS);
        assert_eq!(auth.window, Duration::from_secs(900));
        assert_eq!(auth.max_requests, 20);
        assert!(auth.skip_successful_requests);

        assert_eq!(password_reset(&PASSWORD_RESET).window, Duration::from_secs(3600));
        assert_eq!(sensitive_operations(&SENSITIVE_OPERATIONS).max_requests, 3);
        assert!(!general_api(&GENERAL_API).skip_successful_requests);
    }

    #[test]
    fn test_settings_round_trip_through_config() {
        assert_eq!(password_reset(&PASSWORD_RESET).settings(), PASSWORD_RESET);
    }
}
