//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use parlour_guard::config::GuardConfig;
use parlour_guard::http::HttpServer;
use parlour_guard::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[allow(dead_code)]
pub const ADMIN_KEY: &str = "integration-admin-key";

/// Default config with the admin API mounted.
#[allow(dead_code)]
pub fn admin_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config
}

/// Start a guard on an ephemeral port. Trigger the returned handle to stop it.
pub async fn spawn_guard(mut config: GuardConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

/// Client without pooling or system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
