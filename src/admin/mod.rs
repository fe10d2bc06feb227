pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::get,
    Router,
};

use crate::config::ShieldConfig;
use crate::rate_limit::MemoryStore;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by the admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub config: Arc<ShieldConfig>,
    pub store: Arc<MemoryStore>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

/// Admin routes, all behind the bearer-key check.
///
/// Rate-limit keys are the stored form, `<limiter>:<key>` (e.g. `auth:ip:10.0.0.1`).
pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/rate-limits/{key}", get(get_rate_limit).delete(reset_rate_limit))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
