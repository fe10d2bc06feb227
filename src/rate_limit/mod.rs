//! Rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! request parts
//!     → keys.rs       (derive "ip:…", "email:…", "user:…")
//!     → limiter.rs    ("<limiter>:<key>", count, decide, notify observers)
//!     → store.rs      (fixed-window counter per key)
//!     → middleware.rs (X-RateLimit-* headers or 429)
//! ```
//!
//! # Design Decisions
//! - One store may back many limiters; keys are namespaced by limiter name
//! - Time comes from an injected [`Clock`](clock::Clock)
//! - Denials fan out to [`LimitObserver`]s; observers cannot alter a decision

pub mod clock;
pub mod keys;
pub mod limiter;
pub mod middleware;
pub mod observer;
pub mod presets;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use keys::{EmailHint, EmailOrIpKey, EndpointIpKey, IpKey, KeyExtractor, UserOrIpKey};
pub use limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use middleware::{rate_limit_middleware, RateLimitState, RateLimitTicket};
pub use observer::{AuditObserver, LimitEvent, LimitObserver, MetricsObserver, TracingObserver};
pub use store::{MemoryStore, RateLimitEntry, RateLimitStore};
