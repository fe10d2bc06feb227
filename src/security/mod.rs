//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (attach UserContext from x-user-id)
//!     → bot.rs      (classify User-Agent, tag request)
//!     → context.rs  (transport → origin → CSRF → method)
//!     → handler     (input.rs sanitizes fields and redirect targets)
//!     → headers.rs  (security response headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: the first failing check rejects the request
//! - No trust in client input; unparsable proxy headers are skipped
//! - Token comparisons run in constant time

pub mod bot;
pub mod constants;
pub mod context;
pub mod csrf;
pub mod error;
pub mod headers;
pub mod identity;
pub mod input;
pub mod origin;

pub use bot::{BotDetector, BotVerdict, PatternBotDetector};
pub use context::{SecurityContextValidator, SecurityValidationOptions};
pub use csrf::CsrfTokenService;
pub use error::{SecurityError, SecurityErrorCode, ValidationError};
pub use identity::UserContext;
pub use input::{sanitize_input, validate_redirect_url};
pub use origin::validate_origin;
