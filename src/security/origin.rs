//! Origin / Referer validation against an allow-list.
//!
//! Origin checks are a CSRF mitigation for browser contexts. Requests that
//! carry neither header (API clients, server-to-server) pass through.

use axum::http::{header, HeaderMap};
use url::Url;

/// Whether `url` belongs to the allow-list entry `allowed`.
///
/// Entries are either a bare host (`good.com`, any scheme/port) or a full
/// origin (`https://good.com`, scheme and port must match). Subdomains of an
/// entry match on a `.` boundary only, so `evilgood.com` never matches `good.com`.
pub fn origin_allowed(url: &Url, allowed: &str) -> bool {
    let allowed = allowed.trim().trim_end_matches('/');
    if allowed.is_empty() {
        return false;
    }

    if allowed.contains("://") {
        let Ok(allowed_url) = Url::parse(allowed) else {
            return false;
        };
        if allowed_url.scheme() != url.scheme()
            || allowed_url.port_or_known_default() != url.port_or_known_default()
        {
            return false;
        }
        host_matches(url.host_str(), allowed_url.host_str())
    } else {
        host_matches(url.host_str(), Some(allowed))
    }
}

fn host_matches(host: Option<&str>, allowed: Option<&str>) -> bool {
    let (Some(host), Some(allowed)) = (host, allowed) else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let allowed = allowed.to_ascii_lowercase();
    host == allowed || host.ends_with(&format!(".{}", allowed))
}

/// Effective request origin: the `Origin` header, else the `Referer`'s origin.
///
/// Returns `Some(None)` when a header is present but unparsable (e.g. `Origin: null`).
fn effective_origin(headers: &HeaderMap) -> Option<Option<Url>> {
    let raw = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))?;

    Some(raw.to_str().ok().and_then(|value| Url::parse(value.trim()).ok()))
}

/// Check the request's browser origin against `allowed_origins`.
pub fn validate_origin(headers: &HeaderMap, allowed_origins: &[String]) -> bool {
    match effective_origin(headers) {
        None => true,
        Some(None) => {
            tracing::debug!("Unparsable Origin/Referer header");
            false
        }
        Some(Some(url)) => allowed_origins.iter().any(|allowed| origin_allowed(&url, allowed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn allowed() -> Vec<String> {
        vec!["good.com".to_string(), "https://partner.io".to_string()]
    }

    #[test]
    fn test_no_headers_allowed() {
        assert!(validate_origin(&HeaderMap::new(), &allowed()));
        assert!(validate_origin(&HeaderMap::new(), &[]));
    }

    #[test]
    fn test_origin_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://evil.com"));
        headers.insert(header::REFERER, HeaderValue::from_static("https://good.com/page"));
        assert!(!validate_origin(&headers, &allowed()));
    }

    #[test]
    fn test_referer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("https://app.good.com/login?x=1"));
        assert!(validate_origin(&headers, &allowed()));
    }

    #[test]
    fn test_full_origin_entries_match_scheme_and_port() {
        let url = Url::parse("https://partner.io").unwrap();
        assert!(origin_allowed(&url, "https://partner.io"));
        assert!(!origin_allowed(&Url::parse("http://partner.io").unwrap(), "https://partner.io"));
        assert!(!origin_allowed(&Url::parse("https://partner.io:8443").unwrap(), "https://partner.io"));
        assert!(origin_allowed(&Url::parse("https://api.partner.io").unwrap(), "https://partner.io/"));
    }

    #[test]
    fn test_subdomain_boundary() {
        assert!(!origin_allowed(&Url::parse("https://evilgood.com").unwrap(), "good.com"));
        assert!(origin_allowed(&Url::parse("https://A.Good.com").unwrap(), "good.com"));
        assert!(!origin_allowed(&Url::parse("https://good.com").unwrap(), ""));
    }

    #[test]
    fn test_null_origin_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("null"));
        assert!(!validate_origin(&headers, &allowed()));
    }
}
