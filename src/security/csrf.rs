//! CSRF token issuance and verification (double-submit cookie).
//!
//! A token is 32 random bytes from the OS RNG, hex-encoded. The server sets
//! it as a cookie; state-changing requests echo it in a header or query
//! parameter and both values are compared in constant time.

use axum::http::{header, request::Parts, HeaderMap};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::security::constants::{
    CSRF_COOKIE_NAME, CSRF_HEADER_NAME, CSRF_QUERY_PARAM, CSRF_TOKEN_BYTES,
};

/// Generate a hex-encoded token from `len` cryptographically secure bytes.
pub fn generate_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare a submitted token with the expected one.
///
/// Empty inputs, undecodable hex and differing decoded lengths are rejected
/// before any byte comparison takes place.
pub fn validate_token(provided: &str, expected: &str) -> bool {
    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    let (Ok(provided), Ok(expected)) = (hex::decode(provided), hex::decode(expected)) else {
        return false;
    };
    if provided.len() != expected.len() {
        return false;
    }

    provided.ct_eq(&expected).into()
}

/// Issues CSRF tokens and pulls submitted/expected values off requests.
#[derive(Debug, Clone)]
pub struct CsrfTokenService {
    token_bytes: usize,
    secure_cookie: bool,
}

impl Default for CsrfTokenService {
    fn default() -> Self {
        Self::new(false)
    }
}

impl CsrfTokenService {
    /// `secure_cookie` adds the `Secure` attribute (set in production).
    pub fn new(secure_cookie: bool) -> Self {
        Self {
            token_bytes: CSRF_TOKEN_BYTES,
            secure_cookie,
        }
    }

    pub fn issue(&self) -> String {
        generate_token(self.token_bytes)
    }

    /// `Set-Cookie` value delivering `token` to the browser.
    ///
    /// Not `HttpOnly`: the page script reads it back to echo in the header.
    pub fn cookie(&self, token: &str) -> String {
        let mut cookie = format!("{}={}; Path=/; SameSite=Strict", CSRF_COOKIE_NAME, token);
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Token submitted with the request: `x-csrf-token` header, else `csrf_token` query parameter.
    pub fn submitted_token(&self, parts: &Parts) -> Option<String> {
        let from_header = parts
            .headers
            .get(CSRF_HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        from_header.or_else(|| {
            let query = parts.uri.query()?;
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(name, _)| name == CSRF_QUERY_PARAM)
                .map(|(_, value)| value.into_owned())
        })
    }

    /// Token the server issued, read back from the CSRF cookie.
    pub fn expected_token(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == CSRF_COOKIE_NAME)
            .map(|(_, value)| value.trim().to_string())
    }

    /// Full double-submit check for one request.
    pub fn verify_request(&self, parts: &Parts) -> bool {
        match (self.submitted_token(parts), self.expected_token(&parts.headers)) {
            (Some(provided), Some(expected)) => validate_token(&provided, &expected),
            _ => false,
        }
    }
}
