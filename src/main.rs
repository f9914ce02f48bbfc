//! Parlour Guard service.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http::server ──▶ http::handlers ──▶ SecurityMiddleware
//!                  │                                  │
//!                  │                ┌─────────────────┼────────────────┐
//!                  │                ▼                 ▼                ▼
//!                  │           RateLimiter   ContentValidator   SecurityMonitor
//!                  │
//!                  └──▶ admin (bearer auth) ──▶ stats / events / limits
//!
//!   config::watcher ──▶ HttpServer::run ──▶ policy hot swap
//!   lifecycle::signals ──▶ Shutdown ──▶ server + rate limit sweep
//! ```

use std::path::PathBuf;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use parlour_guard::config::watcher::ConfigWatcher;
use parlour_guard::config::{load_config, GuardConfig, CONFIG_ENV_VAR};
use parlour_guard::lifecycle::signals::spawn_signal_handler;
use parlour_guard::observability::{logging, metrics};
use parlour_guard::{HttpServer, Shutdown};

/// Config path from the first argument, else the environment.
fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    let config = match &path {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "parlour-guard starting");

    match &path {
        Some(path) => tracing::info!(path = %path.display(), "Configuration loaded"),
        None => tracing::info!("No config file given, using defaults"),
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        admin_enabled = config.admin.enabled,
        overrides = config.rate_limits.len(),
        "Effective configuration"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let _signals = spawn_signal_handler(shutdown.clone());

    // Keep the watcher alive for the life of the server.
    let (_watcher, config_updates) = match &path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
