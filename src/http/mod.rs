//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs   (Axum setup, cross-cutting layers)
//!     → request.rs  (request ID)
//!     → [security context, rate limit] per route group
//!     → handlers.rs (reference endpoints)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::ShieldServer;
