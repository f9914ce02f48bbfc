use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::security::rate_limit::{limit_key, RateLimitEntry};
use crate::security::{Action, SecurityEvent, SecurityStats};

const DEFAULT_STATS_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;
const DEFAULT_USER_EVENT_LIMIT: usize = 50;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_keys: usize,
    pub buffered_events: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_keys: state.security.limiter().tracked_keys(),
        buffered_events: state.security.monitor().len(),
    })
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub window_ms: Option<u64>,
}

pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Json<SecurityStats> {
    let window = query.window_ms.unwrap_or(DEFAULT_STATS_WINDOW_MS);
    Json(state.security.monitor().get_stats(window))
}

pub async fn get_events(State(state): State<AppState>) -> Json<Vec<SecurityEvent>> {
    Json(state.security.monitor().export_events())
}

pub async fn clear_events(State(state): State<AppState>) -> StatusCode {
    state.security.monitor().clear();
    tracing::info!("Security event buffer cleared via admin API");
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct UserEventsQuery {
    pub limit: Option<usize>,
}

pub async fn get_user_events(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<UserEventsQuery>,
) -> Json<Vec<SecurityEvent>> {
    let limit = query.limit.unwrap_or(DEFAULT_USER_EVENT_LIMIT);
    Json(state.security.monitor().get_user_events(&user_id, limit))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub action: Action,
}

/// Limiter state of one key after an admin change.
#[derive(Serialize)]
pub struct LimitState {
    pub key: String,
    pub entry: Option<RateLimitEntry>,
}

pub async fn reset_limit(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Json<LimitState> {
    let user_id = request.user_id.as_deref();
    state.security.reset_limit(user_id, request.action);
    let key = limit_key(user_id, request.action);
    tracing::info!(key = %key, "Rate limit reset via admin API");

    Json(LimitState {
        entry: state.security.limiter().entry(&key),
        key,
    })
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BlockRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub action: Action,
    pub duration_ms: u64,
}

pub async fn block_key(
    State(state): State<AppState>,
    Json(request): Json<BlockRequest>,
) -> Result<Json<LimitState>, ApiError> {
    if request.duration_ms == 0 {
        return Err(ApiError::BadRequest(
            "duration_ms must be greater than zero".to_string(),
        ));
    }

    let user_id = request.user_id.as_deref();
    state
        .security
        .block(user_id, request.action, request.duration_ms);
    let key = limit_key(user_id, request.action);
    tracing::warn!(key = %key, duration_ms = request.duration_ms, "Key blocked via admin API");

    Ok(Json(LimitState {
        entry: state.security.limiter().entry(&key),
        key,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::GuardConfig;
    use crate::http::HttpServer;

    const KEY: &str = "test-admin-key";

    fn server() -> HttpServer {
        let mut config = GuardConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = KEY.to_string();
        HttpServer::new(config)
    }

    fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {KEY}"));
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_is_logged() {
        let server = server();
        let response = server
            .router()
            .oneshot(Request::builder().uri("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let events = server.state().security.monitor().export_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_str(), "unauthorized_access");
        assert_eq!(events[0].action, "/admin/status");
    }

    #[tokio::test]
    async fn test_block_then_reset() {
        let server = server();
        let response = server
            .router()
            .oneshot(admin_request(
                "POST",
                "/admin/limits/block",
                Some(json!({
                    "user_id": "mallory",
                    "action": "POST_CREATE",
                    "duration_ms": 60000
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["key"], "mallory:POST_CREATE");
        assert_eq!(body["entry"]["blocked"], true);

        let check = server
            .state()
            .security
            .check_action_permission(Some("mallory"), crate::security::Action::PostCreate, None);
        assert!(!check.allowed);
        assert!(check.blocked);

        let response = server
            .router()
            .oneshot(admin_request(
                "POST",
                "/admin/limits/reset",
                Some(json!({ "user_id": "mallory", "action": "POST_CREATE" })),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body["entry"].is_null());
    }

    #[tokio::test]
    async fn test_zero_duration_block_is_rejected() {
        let response = server()
            .router()
            .oneshot(admin_request(
                "POST",
                "/admin/limits/block",
                Some(json!({ "action": "LOGIN_ATTEMPT", "duration_ms": 0 })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_clear_events() {
        let server = server();
        let _ = server
            .router()
            .oneshot(Request::builder().uri("/admin/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(server.state().security.monitor().len(), 1);

        let response = server
            .router()
            .oneshot(admin_request("DELETE", "/admin/events", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(server.state().security.monitor().is_empty());
    }
}
