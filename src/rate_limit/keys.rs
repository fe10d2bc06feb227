//! Counting-key derivation.
//!
//! A key decides who shares a counter. Keys are opaque strings
//! (`ip:…`, `email:…`, `user:…`, `endpoint:…:…`); the limiter prefixes them
//! with its own name before they reach the store.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::security::identity::UserContext;
use crate::security::input::client_ip_for;

/// Derives the counting key from a request.
pub trait KeyExtractor: Send + Sync {
    fn key(&self, parts: &Parts) -> String;
}

impl<F> KeyExtractor for F
where
    F: Fn(&Parts) -> String + Send + Sync,
{
    fn key(&self, parts: &Parts) -> String {
        self(parts)
    }
}

fn ip_key(parts: &Parts) -> String {
    format!("ip:{}", client_ip_for(parts))
}

/// `ip:<client address>`. The default when a limiter has no extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpKey;

impl KeyExtractor for IpKey {
    fn key(&self, parts: &Parts) -> String {
        ip_key(parts)
    }
}

/// `email:<address>` when an [`EmailHint`] is attached, else the client address.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailOrIpKey;

impl KeyExtractor for EmailOrIpKey {
    fn key(&self, parts: &Parts) -> String {
        match parts.extensions.get::<EmailHint>() {
            Some(EmailHint(email)) => format!("email:{}", email),
            None => ip_key(parts),
        }
    }
}

/// `user:<id>` for authenticated requests, else the client address.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserOrIpKey;

impl KeyExtractor for UserOrIpKey {
    fn key(&self, parts: &Parts) -> String {
        match parts.extensions.get::<UserContext>() {
            Some(user) => format!("user:{}", user.user_id),
            None => ip_key(parts),
        }
    }
}

/// `endpoint:<path>:<client address>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointIpKey;

impl KeyExtractor for EndpointIpKey {
    fn key(&self, parts: &Parts) -> String {
        format!("endpoint:{}:{}", parts.uri.path(), client_ip_for(parts))
    }
}

/// Normalized email address found in the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailHint(pub String);

/// Largest body inspected for an email address.
const EMAIL_HINT_BODY_LIMIT: usize = 16 * 1024;

fn email_from_json(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    let email = value.get("email")?.as_str()?.trim().to_lowercase();
    (!email.is_empty() && email.contains('@')).then_some(email)
}

/// Buffer a JSON body, attach an [`EmailHint`] if it names an email, and pass it on.
///
/// Must run before the rate-limit middleware on routes keyed by [`EmailOrIpKey`].
pub async fn email_hint_middleware(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let bytes = match to_bytes(body, EMAIL_HINT_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Body too large for email inspection");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    if let Some(email) = email_from_json(&bytes) {
        parts.extensions.insert(EmailHint(email));
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts_with(ip: &str, path: &str) -> Parts {
        HttpRequest::post(path)
            .header("x-real-ip", ip)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_ip_and_endpoint_keys() {
        let parts = parts_with("1.2.3.4", "/auth/sign-in");
        assert_eq!(IpKey.key(&parts), "ip:1.2.3.4");
        assert_eq!(EndpointIpKey.key(&parts), "endpoint:/auth/sign-in:1.2.3.4");
    }

    #[test]
    fn test_email_key_falls_back_to_ip() {
        let mut parts = parts_with("1.2.3.4", "/auth/password-reset");
        assert_eq!(EmailOrIpKey.key(&parts), "ip:1.2.3.4");
        parts.extensions.insert(EmailHint("ada@example.com".into()));
        assert_eq!(EmailOrIpKey.key(&parts), "email:ada@example.com");
    }

    #[test]
    fn test_user_key_falls_back_to_ip() {
        let mut parts = parts_with("5.6.7.8", "/auth/sensitive");
        assert_eq!(UserOrIpKey.key(&parts), "ip:5.6.7.8");
        parts.extensions.insert(UserContext { user_id: "u-42".into() });
        assert_eq!(UserOrIpKey.key(&parts), "user:u-42");
    }

    #[test]
    fn test_closure_extractor() {
        let by_path = |parts: &Parts| format!("path:{}", parts.uri.path());
        assert_eq!(by_path.key(&parts_with("1.1.1.1", "/x")), "path:/x");
    }

    #[test]
    fn test_email_from_json() {
        assert_eq!(
            email_from_json(br#"{"email":"  Ada@Example.com "}"#).as_deref(),
            Some("ada@example.com")
        );
        assert!(email_from_json(br#"{"email":""}"#).is_none());
        assert!(email_from_json(br#"{"email":42}"#).is_none());
        assert!(email_from_json(b"not json").is_none());
    }
}
