//! Rate limiting under concurrent load and through the admin API.

use futures_util::future::join_all;
use reqwest::StatusCode;
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_concurrent_requests_never_exceed_limit() {
    let mut config = common::test_config();
    config.rate_limits.api.max_requests = 50;
    let (addr, shutdown) = common::start_server(config).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/profile", addr);

    let responses = join_all((0..80).map(|_| client.get(&url).send())).await;
    let statuses: Vec<StatusCode> = responses.into_iter().map(|r| r.unwrap().status()).collect();

    let allowed = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let limited = statuses
        .iter()
        .filter(|s| **s == StatusCode::TOO_MANY_REQUESTS)
        .count();
    assert_eq!(allowed, 50);
    assert_eq!(limited, 30);

    shutdown.trigger();
}

#[tokio::test]
async fn test_clients_are_counted_separately() {
    let mut config = common::test_config();
    config.rate_limits.api.max_requests = 1;
    let (addr, shutdown) = common::start_server(config).await;
    let client = reqwest::Client::new();
    let profile = |ip: &'static str| {
        client
            .get(format!("http://{}/api/profile", addr))
            .header("x-forwarded-for", format!("{}, 10.9.9.9", ip))
            .send()
    };

    let res = profile("203.0.113.7").await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["clientIp"], "203.0.113.7");
    assert!(body["requestId"].is_string());

    assert_eq!(profile("203.0.113.7").await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(profile("203.0.113.8").await.unwrap().status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn test_admin_inspect_and_reset() {
    let mut config = common::test_config();
    config.rate_limits.api.max_requests = 2;
    let (addr, shutdown) = common::start_server(config).await;
    let client = reqwest::Client::new();
    let profile = format!("http://{}/api/profile", addr);
    let entry = format!("http://{}/admin/rate-limits/api:ip:127.0.0.1", addr);
    let bearer = format!("Bearer {}", common::ADMIN_KEY);

    for _ in 0..3 {
        client.get(&profile).send().await.unwrap();
    }

    let denied = client.get(&entry).bearer_auth("wrong").send().await.unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(&entry)
        .header("authorization", &bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["key"], "api:ip:127.0.0.1");
    assert_eq!(body["count"], 3);
    assert!(body["resetAt"].as_str().unwrap().ends_with('Z'));

    let res = client
        .delete(&entry)
        .header("authorization", &bearer)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["cleared"], true);

    assert_eq!(client.get(&profile).send().await.unwrap().status(), StatusCode::OK);

    let status: Value = client
        .get(format!("http://{}/admin/status", addr))
        .header("authorization", &bearer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["sweeperRunning"], true);
    assert_eq!(status["storeEntries"], 1);

    shutdown.trigger();
}
