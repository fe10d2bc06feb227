//! End-to-end checks of the security context on the reference endpoints.

use auth_shield::config::Environment;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_csrf_double_submit_flow() {
    let (addr, shutdown) = common::start_server(common::test_config()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/auth/sign-in", addr);
    let credentials = json!({ "email": "ada@example.com", "password": "correct horse" });

    // No token at all
    let res = client.post(&url).json(&credentials).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "CSRF_TOKEN_INVALID");

    let (token, cookie) = common::csrf_pair(&client, addr).await;
    assert_eq!(token.len(), 64);

    // Header token that does not match the cookie
    let res = client
        .post(&url)
        .header("cookie", &cookie)
        .header("x-csrf-token", "ab".repeat(32))
        .json(&credentials)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Matching pair via the query parameter
    let res = client
        .post(format!("{}?csrf_token={}", url, token))
        .header("cookie", &cookie)
        .json(&credentials)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["userId"], "u-ada");

    shutdown.trigger();
}

#[tokio::test]
async fn test_failed_sign_ins_lock_out_and_success_clears() {
    let mut config = common::test_config();
    config.rate_limits.auth.max_requests = 2;
    let (addr, shutdown) = common::start_server(config).await;
    let client = reqwest::Client::new();
    let (token, cookie) = common::csrf_pair(&client, addr).await;

    let attempt = |password: &'static str| {
        client
            .post(format!("http://{}/auth/sign-in", addr))
            .header("cookie", &cookie)
            .header("x-csrf-token", &token)
            .json(&json!({ "email": "ada@example.com", "password": password }))
            .send()
    };

    let res = attempt("wrong").await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()["x-ratelimit-limit"], "2");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "1");

    // Success wipes the failed attempt
    assert_eq!(attempt("correct horse").await.unwrap().status(), StatusCode::OK);

    assert_eq!(attempt("wrong").await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(attempt("wrong").await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let res = attempt("correct horse").await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 15 * 60);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Rate limit exceeded");
    assert_eq!(body["retryAfter"], retry_after);

    shutdown.trigger();
}

#[tokio::test]
async fn test_password_reset_is_keyed_by_email() {
    let mut config = common::test_config();
    config.rate_limits.password_reset.max_requests = 2;
    let (addr, shutdown) = common::start_server(config).await;
    let client = reqwest::Client::new();
    let (token, cookie) = common::csrf_pair(&client, addr).await;

    let reset = |email: &'static str, ip: &'static str| {
        client
            .post(format!("http://{}/auth/password-reset", addr))
            .header("cookie", &cookie)
            .header("x-csrf-token", &token)
            .header("x-forwarded-for", ip)
            .json(&json!({ "email": email }))
            .send()
    };

    assert_eq!(reset("Ada@Example.com", "10.0.0.1").await.unwrap().status(), StatusCode::ACCEPTED);
    assert_eq!(reset("ada@example.com", "10.0.0.2").await.unwrap().status(), StatusCode::ACCEPTED);
    // Same mailbox from a third address is still the same counter
    assert_eq!(
        reset("ada@example.com", "10.0.0.3").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(reset("bob@example.com", "10.0.0.3").await.unwrap().status(), StatusCode::ACCEPTED);

    shutdown.trigger();
}

#[tokio::test]
async fn test_sensitive_requires_user_and_limits_per_user() {
    let mut config = common::test_config();
    config.rate_limits.sensitive.max_requests = 1;
    let (addr, shutdown) = common::start_server(config).await;
    let client = reqwest::Client::new();
    let (token, cookie) = common::csrf_pair(&client, addr).await;

    let call = |user: Option<&'static str>| {
        let mut req = client
            .post(format!("http://{}/auth/sensitive", addr))
            .header("cookie", &cookie)
            .header("x-csrf-token", &token)
            .json(&json!({ "action": "rotate <keys>" }));
        if let Some(user) = user {
            req = req.header("x-user-id", user);
        }
        req.send()
    };

    let anonymous = call(None).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let res = call(Some("u-1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["action"], "rotate keys");

    assert_eq!(call(Some("u-1")).await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(call(Some("u-2")).await.unwrap().status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn test_redirect_allow_list() {
    let (addr, shutdown) = common::start_server(common::test_config()).await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let go = |target: &str| {
        client
            .get(format!("http://{}/auth/redirect", addr))
            .query(&[("to", target)])
            .send()
    };

    let res = go("/dashboard?tab=1").await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()["location"], "/dashboard?tab=1");

    let res = go("https://app.example.com/welcome").await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    // Control characters in an allowed target come back percent-encoded
    let res = go("https://app.example.com/a\u{7f}b").await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()["location"], "https://app.example.com/a%7Fb");

    for hostile in [
        "javascript:alert(1)",
        "https://evil.example.net/",
        "//evil.example.net",
        "ftp://evil.example.net/x",
    ] {
        let res = go(hostile).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{hostile}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["field"], "to");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_origin_check_runs_before_csrf() {
    let mut config = common::test_config();
    config.security.validation.validate_origin = true;
    let (addr, shutdown) = common::start_server(config).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("http://{}/auth/sign-in", addr))
        .header("origin", "https://evil.example.net")
        .json(&json!({ "email": "a@b.c", "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "ORIGIN_NOT_ALLOWED");

    shutdown.trigger();
}

#[tokio::test]
async fn test_production_requires_https() {
    let mut config = common::test_config();
    config.environment = Environment::Production;
    let (addr, shutdown) = common::start_server(config).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/auth/sign-in", addr);

    let res = client.post(&url).json(&json!({})).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "INSECURE_TRANSPORT");

    // Behind a TLS-terminating proxy the request moves on to the CSRF check
    let res = client
        .post(&url)
        .header("x-forwarded-proto", "https")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    shutdown.trigger();
}

#[tokio::test]
async fn test_cross_cutting_headers() {
    let (addr, shutdown) = common::start_server(common::test_config()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("http://{}/health", addr))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "trace-me");
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert_eq!(res.headers()["referrer-policy"], "strict-origin-when-cross-origin");

    shutdown.trigger();
}
