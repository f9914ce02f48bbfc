//! Request ID handling.
//!
//! # Responsibilities
//! - Generate a UUID request ID when the client sent none
//! - Echo the ID back on the response
//! - Expose the ID to handlers and trace spans
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A client-supplied `x-request-id` is kept as-is

use axum::http::{HeaderName, Request};
use axum::Router;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Read the request ID assigned by [`with_request_id`].
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.extensions()
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .or_else(|| {
                self.headers()
                    .get(&X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
            })
    }
}

/// Assign and propagate request IDs. Apply after any layer that should see
/// the ID (e.g. tracing), so these run first.
pub fn with_request_id<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_generates_and_propagates_id() {
        let app = with_request_id(Router::new().route("/", get(|| async { "ok" })));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = response.headers()[&X_REQUEST_ID].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_keeps_client_id() {
        let app = with_request_id(Router::new().route("/", get(|| async { "ok" })));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "tea-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[&X_REQUEST_ID], "tea-123");
    }

    #[test]
    fn test_request_id_ext_reads_header() {
        let request = Request::builder()
            .header("x-request-id", "abc")
            .body(())
            .unwrap();
        assert_eq!(request.request_id(), Some("abc"));
    }
}
