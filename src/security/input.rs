//! Input sanitization, redirect validation and client address extraction.
//!
//! # Responsibilities
//! - Strip injection metacharacters and control characters from free text
//! - Refuse open-redirect targets (dangerous schemes, foreign origins)
//! - Derive the client address from proxy headers
//!
//! # Design Decisions
//! - Sanitization is idempotent: its output contains nothing it would strip
//! - Scheme checks run on the raw string, before any URL parsing
//! - Unparsable proxy headers are skipped, never trusted

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use axum::extract::ConnectInfo;
use axum::http::{request::Parts, HeaderMap};
use serde_json::Value;
use url::Url;

use crate::security::constants::{
    BLOCKED_URL_SCHEMES, CLIENT_IP_HEADERS, MAX_INPUT_LENGTH, MAX_URL_LENGTH,
};
use crate::security::error::ValidationError;
use crate::security::origin::origin_allowed;

/// Address reported when no proxy header yields a valid IP.
pub const FALLBACK_CLIENT_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// C0 and C1 control characters (including DEL).
fn is_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

fn is_stripped(c: char) -> bool {
    matches!(c, '<' | '>' | '&' | '"' | '\'' | '/' | '\\') || is_control(c)
}

/// Sanitize free text using the default length ceiling.
pub fn sanitize_input(raw: &str) -> Result<String, ValidationError> {
    sanitize_input_with_limit(raw, MAX_INPUT_LENGTH)
}

/// Strip HTML/script metacharacters and control characters, then trim.
pub fn sanitize_input_with_limit(raw: &str, max_len: usize) -> Result<String, ValidationError> {
    if raw.chars().count() > max_len {
        return Err(ValidationError::new(format!(
            "Input exceeds maximum length of {} characters",
            max_len
        )));
    }

    let cleaned: String = raw.chars().filter(|c| !is_stripped(*c)).collect();
    Ok(cleaned.trim().to_string())
}

/// Sanitize a JSON field that must be a string.
pub fn sanitize_value(value: &Value, max_len: usize) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => sanitize_input_with_limit(s, max_len),
        _ => Err(ValidationError::new("Input must be a string")),
    }
}

/// Validate a redirect target.
///
/// Relative targets are returned with quotes, angle brackets and control
/// characters removed. Absolute targets must be `http`/`https` and, when
/// `allowed_origins` is non-empty, belong to one of the listed origins or a
/// subdomain of one. They are returned in normalized, percent-encoded form,
/// so the result is always usable as a `Location` header value.
pub fn validate_redirect_url(
    url: &str,
    allowed_origins: &[String],
) -> Result<String, ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::new("Redirect URL is required").with_field("redirect"));
    }
    if url.chars().count() > MAX_URL_LENGTH {
        return Err(ValidationError::new(format!(
            "Redirect URL exceeds maximum length of {} characters",
            MAX_URL_LENGTH
        ))
        .with_field("redirect"));
    }

    // Browsers ignore embedded tabs/newlines and leading junk when resolving a scheme.
    let probe: String = url
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    let probe = probe
        .trim_start_matches(|c: char| c.is_whitespace() || is_control(c))
        .to_ascii_lowercase();
    if BLOCKED_URL_SCHEMES.iter().any(|scheme| probe.starts_with(scheme)) {
        return Err(ValidationError::new("Redirect URL uses a forbidden scheme").with_field("redirect"));
    }

    let trimmed = url.trim();
    if !probe.starts_with("http") {
        let relative: String = trimmed
            .chars()
            .filter(|c| !matches!(c, '"' | '\'' | '<' | '>') && !is_control(*c))
            .collect();
        if is_protocol_relative(&relative) {
            return Err(ValidationError::new("Protocol-relative redirects are not allowed")
                .with_field("redirect"));
        }
        // Anything carrying its own non-http scheme is not relative.
        if Url::parse(&relative).is_ok() {
            return Err(ValidationError::new("Redirect URL uses a forbidden scheme").with_field("redirect"));
        }
        return Ok(relative);
    }

    let parsed = Url::parse(trimmed)
        .map_err(|_| ValidationError::new("Invalid redirect URL").with_field("redirect"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::new("Redirect URL uses a forbidden scheme").with_field("redirect"));
    }

    if !allowed_origins.is_empty()
        && !allowed_origins.iter().any(|allowed| origin_allowed(&parsed, allowed))
    {
        tracing::warn!(origin = %parsed.origin().ascii_serialization(), "Redirect to foreign origin refused");
        return Err(ValidationError::new("Redirect URL origin is not allowed").with_field("redirect"));
    }

    Ok(parsed.to_string())
}

fn is_protocol_relative(target: &str) -> bool {
    let mut chars = target.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('/' | '\\'), Some('/' | '\\'))
    )
}

/// Parse one proxy header value into an address.
///
/// Takes the first comma-separated element and unwraps the RFC 7239
/// `for="[v6]:port"` form.
fn parse_header_ip(raw: &str) -> Option<IpAddr> {
    let first = raw.split(',').next()?.trim();

    let candidate = first
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            part.get(..4)
                .filter(|prefix| prefix.eq_ignore_ascii_case("for="))
                .map(|_| &part[4..])
        })
        .unwrap_or(first)
        .trim_matches('"');

    let candidate = match candidate.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => candidate,
    };

    IpAddr::from_str(candidate).ok()
}

/// First valid client address found in the proxy headers, by priority.
pub fn client_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_header_ip)
    })
}

/// Client address from proxy headers, or the loopback fallback.
pub fn client_ip(headers: &HeaderMap) -> IpAddr {
    client_ip_from_headers(headers).unwrap_or(FALLBACK_CLIENT_IP)
}

/// Client address for a request: proxy headers, then the socket peer, then loopback.
pub fn client_ip_for(parts: &Parts) -> IpAddr {
    client_ip_from_headers(&parts.headers)
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(FALLBACK_CLIENT_IP)
}
