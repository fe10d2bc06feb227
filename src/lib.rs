//! Request-security and rate-limiting engine for authentication endpoints.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id → trace → timeout → body limit
//!                         │
//!                         ▼
//!                  security headers → identity → bot detection
//!                         │
//!                         ▼
//!     ┌──────────────────────────────────────────────┐
//!     │ security context (transport, origin, CSRF)   │  /auth/*
//!     └──────────────────────┬───────────────────────┘
//!                            ▼
//!     ┌──────────────────────────────────────────────┐
//!     │ rate limit (preset per route) ── store       │
//!     │        │ denial                              │
//!     │        └──▶ observers (log, metrics, audit)  │
//!     └──────────────────────┬───────────────────────┘
//!                            ▼
//!                         handler (input sanitization, redirect checks)
//! ```

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rate_limit;
pub mod security;

pub use config::schema::ShieldConfig;
pub use http::ShieldServer;
pub use lifecycle::Shutdown;
pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use security::{SecurityContextValidator, SecurityError, ValidationError};
