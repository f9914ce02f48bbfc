//! Public API handlers.

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::security::forms::{ContactMessage, FormValidation, PostDraft, ProfileUpdate};
use crate::security::{Action, SecurityCheckResult};

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Body of `POST /v1/permissions/check`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermissionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub action: Action,
    #[serde(default)]
    pub content: Option<String>,
}

fn check_status(result: &SecurityCheckResult) -> StatusCode {
    if result.allowed {
        StatusCode::OK
    } else if result.is_rate_limited() {
        StatusCode::TOO_MANY_REQUESTS
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

pub async fn check_permission(
    State(state): State<AppState>,
    Json(request): Json<PermissionRequest>,
) -> Response {
    let result = state.security.check_action_permission(
        request.user_id.as_deref(),
        request.action,
        request.content.as_deref(),
    );

    let status = check_status(&result);
    if !result.allowed {
        tracing::debug!(
            user_id = request.user_id.as_deref().unwrap_or("anonymous"),
            action = %request.action,
            status = status.as_u16(),
            "Action rejected"
        );
    }

    let retry_after = result
        .is_rate_limited()
        .then(|| result.reset_in_ms.unwrap_or_default().div_ceil(1000));
    let mut response = (status, Json(result)).into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

fn form_response<T: Serialize>(
    validation: FormValidation<T>,
) -> (StatusCode, Json<FormValidation<T>>) {
    let status = if validation.valid {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(validation))
}

pub async fn validate_post(
    State(state): State<AppState>,
    Json(post): Json<PostDraft>,
) -> impl IntoResponse {
    form_response(
        state
            .security
            .validate_post_creation(&post.title, &post.content),
    )
}

pub async fn validate_contact(
    State(state): State<AppState>,
    Json(form): Json<ContactMessage>,
) -> impl IntoResponse {
    form_response(
        state
            .security
            .validate_contact_form(&form.name, &form.email, &form.message),
    )
}

pub async fn validate_profile(
    State(state): State<AppState>,
    Json(profile): Json<ProfileUpdate>,
) -> impl IntoResponse {
    form_response(
        state
            .security
            .validate_profile_update(&profile.display_name, profile.bio.as_deref()),
    )
}
