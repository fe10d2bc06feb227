use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::admin::AdminState;
use crate::config::{Environment, RateLimitPresets};
use crate::rate_limit::{RateLimitEntry, RateLimitStore};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub environment: Environment,
    pub uptime_secs: u64,
    pub store_entries: usize,
    pub sweeper_running: bool,
    pub rate_limits: RateLimitPresets,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub key: String,
    #[serde(flatten)]
    pub entry: RateLimitEntry,
    pub reset_at: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        environment: state.config.environment,
        uptime_secs: state.started_at.elapsed().as_secs(),
        store_entries: state.store.len(),
        sweeper_running: state.store.sweeper_running(),
        rate_limits: state.config.rate_limits.clone(),
    })
}

pub async fn get_rate_limit(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> Response {
    match state.store.get(&key) {
        Some(entry) => {
            let reset_at = entry.reset_iso();
            Json(EntryView { key, entry, reset_at }).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No active entry", "key": key })),
        )
            .into_response(),
    }
}

pub async fn reset_rate_limit(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> Json<serde_json::Value> {
    let existed = state.store.get(&key).is_some();
    state.store.reset(&key);
    tracing::info!(key = %key, existed, "Rate-limit entry reset by admin");
    Json(json!({ "key": key, "cleared": existed }))
}
