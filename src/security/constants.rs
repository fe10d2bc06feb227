//! Fixed security parameters shared across the engine.

/// Number of random bytes in a CSRF token (hex-encoded to twice this length).
pub const CSRF_TOKEN_BYTES: usize = 32;

/// Cookie holding the expected CSRF token (double-submit pattern).
pub const CSRF_COOKIE_NAME: &str = "stack-auth-csrf-token";

/// Request header carrying the submitted CSRF token.
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Query parameter carrying the submitted CSRF token when no header is sent.
pub const CSRF_QUERY_PARAM: &str = "csrf_token";

/// Maximum accepted length (in characters) of a free-form input field.
pub const MAX_INPUT_LENGTH: usize = 10_000;

/// Maximum accepted length (in characters) of a redirect target.
pub const MAX_URL_LENGTH: usize = 2_048;

/// Schemes that are never followed as redirect targets.
pub const BLOCKED_URL_SCHEMES: [&str; 4] = ["javascript:", "data:", "vbscript:", "file:"];

/// Proxy headers consulted for the client address, highest priority first.
pub const CLIENT_IP_HEADERS: [&str; 8] = [
    "cf-connecting-ip",
    "x-real-ip",
    "x-forwarded-for",
    "x-client-ip",
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

/// Header set by TLS-terminating proxies.
pub const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// Header an upstream authenticator uses to pass the user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Security headers added to every response that does not already carry them.
pub const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];
