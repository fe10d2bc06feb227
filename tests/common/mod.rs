//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use auth_shield::config::UserCredential;
use auth_shield::{ShieldConfig, ShieldServer, Shutdown};
use tokio::net::TcpListener;

#[allow(dead_code)]
pub const ADMIN_KEY: &str = "integration-admin-key";

/// A development config with one account, the admin API on and
/// `x-user-id` trusted as if set by an upstream authenticator.
#[allow(dead_code)]
pub fn test_config() -> ShieldConfig {
    let mut config = ShieldConfig::default();
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config.security.trust_user_header = true;
    config.security.validation.allowed_origins = vec!["https://app.example.com".to_string()];
    config.users.push(UserCredential {
        email: "ada@example.com".to_string(),
        password: "correct horse".to_string(),
        user_id: Some("u-ada".to_string()),
    });
    config
}

/// Start a server on an ephemeral port. Drop or trigger the returned
/// [`Shutdown`] to stop it.
pub async fn start_server(config: ShieldConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = ShieldServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}

/// Fetch a CSRF token and the matching `Cookie` header value.
#[allow(dead_code)]
pub async fn csrf_pair(client: &reqwest::Client, addr: SocketAddr) -> (String, String) {
    let res = client
        .get(format!("http://{}/auth/csrf", addr))
        .send()
        .await
        .unwrap();
    let cookie = res.headers()["set-cookie"]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let body: serde_json::Value = res.json().await.unwrap();
    (body["csrfToken"].as_str().unwrap().to_string(), cookie)
}
