//! Admin API for inspecting and steering the guard at runtime.
//!
//! Every route sits behind bearer-token auth; see [`auth`].

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

/// Admin routes, ready to merge into the public router.
pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/stats", get(get_stats))
        .route("/admin/events", get(get_events).delete(clear_events))
        .route("/admin/users/{user_id}/events", get(get_user_events))
        .route("/admin/limits/reset", post(reset_limit))
        .route("/admin/limits/block", post(block_key))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
