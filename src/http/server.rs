//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the reference endpoints
//! - Attach per-route rate limits from the configured presets
//! - Wire up middleware (request ID, tracing, timeout, body limit,
//!   security headers, bot detection, identity)
//! - Own the rate-limit store: start its sweeper, close it on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::ShieldConfig;
use crate::http::handlers::{self, AppState};
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::observability::audit::{AuditSink, TracingAuditSink};
use crate::rate_limit::keys::email_hint_middleware;
use crate::rate_limit::{
    presets, rate_limit_middleware, AuditObserver, Clock, MemoryStore, MetricsObserver,
    RateLimitConfig, RateLimitState, RateLimiter, SystemClock, TracingObserver,
};
use crate::security::bot::{bot_detection_middleware, BotDetector, PatternBotDetector};
use crate::security::context::{
    security_context_middleware, SecurityContextState, SecurityContextValidator,
};
use crate::security::headers::with_security_headers;
use crate::security::identity::identity_middleware;

/// HTTP server for the request-security engine.
pub struct ShieldServer {
    router: Router,
    config: Arc<ShieldConfig>,
    store: Arc<MemoryStore>,
    limiter: Arc<RateLimiter>,
}

impl ShieldServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ShieldConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an explicit time source for rate-limit windows.
    pub fn with_clock(config: ShieldConfig, clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(config);
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let limiter = Arc::new(
            RateLimiter::new(store.clone(), clock)
                .with_observer(Arc::new(TracingObserver))
                .with_observer(Arc::new(MetricsObserver))
                .with_observer(Arc::new(AuditObserver::new(audit.clone()))),
        );

        let router = Self::build_router(&config, store.clone(), limiter.clone(), audit);
        Self {
            router,
            config,
            store,
            limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &Arc<ShieldConfig>,
        store: Arc<MemoryStore>,
        limiter: Arc<RateLimiter>,
        audit: Arc<dyn AuditSink>,
    ) -> Router {
        let security = &config.security;
        let validator = Arc::new(SecurityContextValidator::new(
            security.validation.clone(),
            config.environment,
            security.trust_forwarded_proto,
        ));

        let state = AppState {
            security: validator.clone(),
            audit: audit.clone(),
            users: Arc::new(config.users.clone()),
            redirect_origins: Arc::new(security.validation.allowed_origins.clone()),
        };

        let limit = |rate_limit: RateLimitConfig| {
            middleware::from_fn_with_state(
                RateLimitState::new(limiter.clone(), rate_limit),
                rate_limit_middleware,
            )
        };
        let presets_cfg = &config.rate_limits;

        let auth_routes = Router::new()
            .route("/auth/csrf", get(handlers::issue_csrf))
            .route("/auth/redirect", get(handlers::redirect))
            .route(
                "/auth/sign-in",
                post(handlers::sign_in).layer(limit(presets::auth_attempts(&presets_cfg.auth))),
            )
            .route(
                "/auth/password-reset",
                post(handlers::password_reset)
                    .layer(limit(presets::password_reset(&presets_cfg.password_reset)))
                    .layer(middleware::from_fn(email_hint_middleware)),
            )
            .route(
                "/auth/sensitive",
                post(handlers::sensitive)
                    .layer(limit(presets::sensitive_operations(&presets_cfg.sensitive))),
            )
            .route_layer(middleware::from_fn_with_state(
                SecurityContextState {
                    validator,
                    audit,
                },
                security_context_middleware,
            ));

        let api_routes = Router::new().route(
            "/api/profile",
            get(handlers::profile).layer(limit(presets::general_api(&presets_cfg.api))),
        );

        let mut app = Router::new()
            .route("/health", get(handlers::health))
            .merge(auth_routes)
            .merge(api_routes)
            .with_state(state);

        if config.admin.enabled {
            app = app.merge(setup_admin_router(AdminState {
                config: config.clone(),
                store,
                api_key: Arc::from(config.admin.api_key.as_str()),
                started_at: Instant::now(),
            }));
        }

        if security.bot_detection {
            let detector: Arc<dyn BotDetector> = Arc::new(PatternBotDetector::default());
            app = app.layer(middleware::from_fn_with_state(detector, bot_detection_middleware));
        }
        if security.trust_user_header {
            app = app.layer(middleware::from_fn(identity_middleware));
        }

        if security.enable_headers {
            app = with_security_headers(app);
        }

        app.layer(RequestBodyLimitLayer::new(security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.config.environment,
            admin = self.config.admin.enabled,
            "HTTP server starting"
        );

        self.store
            .start_sweeper(Duration::from_secs(self.config.store.sweep_interval_secs));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        self.store.close().await;
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }
}
