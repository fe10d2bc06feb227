//! Security response headers.
//!
//! # Responsibilities
//! - Add the fixed security header set to every response
//! - Never overwrite a header a handler already set
//!
//! # Design Decisions
//! - Router-level layers use tower-http's `SetResponseHeaderLayer::if_not_present`
//! - [`apply_security_headers`] covers responses built outside the router

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::security::constants::SECURITY_HEADERS;

fn security_headers() -> impl Iterator<Item = (HeaderName, HeaderValue)> {
    SECURITY_HEADERS
        .into_iter()
        .map(|(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
}

/// Insert each security header that `headers` does not already carry.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in security_headers() {
        headers.entry(name).or_insert(value);
    }
}

/// Layer the security header set onto `router`.
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    security_headers().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(name, value))
    })
}
