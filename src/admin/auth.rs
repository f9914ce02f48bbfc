use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::security::{EventResult, NewSecurityEvent, SecurityEventType};

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Reject admin calls without the configured key and record the attempt.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let config = state.config.load();
    if bearer_token(&request) == Some(config.admin.api_key.as_str()) {
        return Ok(next.run(request).await);
    }

    state.security.monitor().log_event(
        NewSecurityEvent::new(
            SecurityEventType::UnauthorizedAccess,
            request.uri().path(),
            EventResult::Blocked,
        )
        .reason("Missing or invalid admin token")
        .metadata(json!({ "method": request.method().as_str() })),
    );
    Err(ApiError::Unauthorized)
}
