//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shield_rate_limit_checks_total` (counter): checks by limiter, outcome
//! - `shield_rate_limited_total` (counter): denials by limiter
//! - `shield_security_rejections_total` (counter): context rejections by code
//! - `shield_bot_requests_total` (counter): requests classified as bots
//! - `shield_rate_limit_store_entries` (gauge): live store entries
//! - `shield_operation_duration_seconds` (histogram): timed operations
//!
//! # Design Decisions
//! - The `metrics` facade is a no-op until a recorder is installed
//! - Prometheus exporter is optional and owns its own HTTP listener

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::security::error::SecurityErrorCode;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_rate_limit_check(limiter: &str, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    ::metrics::counter!(
        "shield_rate_limit_checks_total",
        "limiter" => limiter.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_rate_limited(limiter: &str) {
    ::metrics::counter!("shield_rate_limited_total", "limiter" => limiter.to_string()).increment(1);
}

pub fn record_security_rejection(code: SecurityErrorCode) {
    ::metrics::counter!("shield_security_rejections_total", "code" => code.as_str()).increment(1);
}

pub fn record_bot_request() {
    ::metrics::counter!("shield_bot_requests_total").increment(1);
}

pub fn record_store_size(entries: usize) {
    ::metrics::gauge!("shield_rate_limit_store_entries").set(entries as f64);
}

pub fn record_operation(name: &'static str, outcome: &'static str, elapsed: Duration) {
    ::metrics::histogram!(
        "shield_operation_duration_seconds",
        "operation" => name,
        "outcome" => outcome
    )
    .record(elapsed.as_secs_f64());
}
