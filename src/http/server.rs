//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeouts, body limits, headers)
//! - Mount the admin API when enabled
//! - Apply config reloads to the shared security middleware
//! - Run the rate limit sweep for the server's lifetime

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::GuardConfig;
use crate::http::handlers;
use crate::http::request::{with_request_id, RequestIdExt};
use crate::observability::metrics;
use crate::security::headers::with_security_headers;
use crate::security::SecurityMiddleware;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub security: Arc<SecurityMiddleware>,
    pub config: Arc<ArcSwap<GuardConfig>>,
}

impl AppState {
    pub fn new(config: GuardConfig, security: Arc<SecurityMiddleware>) -> Self {
        Self {
            security,
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Store `config` and push it into the security policy.
    pub fn apply_config(&self, config: GuardConfig) {
        self.security.reload(&config);
        self.config.store(Arc::new(config));
    }
}

/// HTTP server for the security guard.
pub struct HttpServer {
    router: Router,
    config: GuardConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with a fresh security middleware.
    pub fn new(config: GuardConfig) -> Self {
        let security = Arc::new(SecurityMiddleware::new(&config));
        Self::with_security(config, security)
    }

    /// Create a server around an existing middleware instance.
    pub fn with_security(config: GuardConfig, security: Arc<SecurityMiddleware>) -> Self {
        let state = AppState::new(config.clone(), security);
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route("/v1/permissions/check", post(handlers::check_permission))
            .route("/v1/validate/post", post(handlers::validate_post))
            .route("/v1/validate/contact", post(handlers::validate_contact))
            .route("/v1/validate/profile", post(handlers::validate_profile));

        if config.admin.enabled {
            router = router.merge(admin::admin_routes(state.clone()));
        }

        let router = router
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = request.request_id().unwrap_or("unknown"),
                )
            }));

        let router = with_request_id(router);
        if config.security.enable_headers {
            with_security_headers(router)
        } else {
            router
        }
    }

    /// A clone of the router, for driving the API without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs arriving on `config_updates` are applied without a restart.
    /// The listener address and the admin mount are fixed at startup.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweep = self.state.security.spawn_maintenance(
            Duration::from_secs(self.config.rate_limiter.cleanup_interval_secs),
            shutdown.resubscribe(),
        );

        let state = self.state.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                state.apply_config(config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        reloader.abort();
        if let Err(e) = sweep.await {
            tracing::warn!(error = %e, "Rate limit sweep ended abnormally");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Record request count and latency per matched route.
async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_allowed_check() {
        let server = HttpServer::new(GuardConfig::default());
        let response = server
            .router()
            .oneshot(json_request(
                "/v1/permissions/check",
                json!({ "user_id": "ada", "action": "DIARY_CREATE", "content": "Dear diary" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        let body = body_json(response).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["remaining"], 19);
    }

    #[tokio::test]
    async fn test_rate_limited_check_sets_retry_after() {
        let mut config = GuardConfig::default();
        config.rate_limits.insert(
            "LIKE_ACTION".into(),
            crate::security::ActionLimit::new(1, 120_000),
        );
        let server = HttpServer::new(config);
        let body = json!({ "user_id": "ada", "action": "LIKE_ACTION" });

        let first = server
            .router()
            .oneshot(json_request("/v1/permissions/check", body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = server
            .router()
            .oneshot(json_request("/v1/permissions/check", body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = second.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry_after > 0 && retry_after <= 120);
    }

    #[tokio::test]
    async fn test_unknown_action_is_rejected() {
        let server = HttpServer::new(GuardConfig::default());
        let response = server
            .router()
            .oneshot(json_request(
                "/v1/permissions/check",
                json!({ "action": "TEA_POUR" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_contact_validation_endpoint() {
        let server = HttpServer::new(GuardConfig::default());
        let response = server
            .router()
            .oneshot(json_request(
                "/v1/validate/contact",
                json!({ "name": "Ada", "email": "nope", "message": "Hello there, parlour!" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["errors"][0], "Please enter a valid email address");
    }

    #[tokio::test]
    async fn test_admin_routes_absent_when_disabled() {
        let server = HttpServer::new(GuardConfig::default());
        let response = server
            .router()
            .oneshot(Request::builder().uri("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_apply_config_swaps_policy() {
        let server = HttpServer::new(GuardConfig::default());
        let mut config = GuardConfig::default();
        config.fields.bio_max = 3;
        server.state().apply_config(config);

        assert_eq!(server.state().config.load().fields.bio_max, 3);
        assert!(!server
            .state()
            .security
            .validate_profile_update("Ada Lovelace", Some("too long"))
            .valid);
    }
}
