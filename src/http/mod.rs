//! HTTP surface of the guard.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, config reload)
//!     → request.rs (request ID assigned and echoed)
//!     → handlers.rs (permission check, form validation)
//!     → security::SecurityMiddleware (limiter, validator, monitor)
//!     → error.rs / JSON body back to the client
//! ```
//!
//! # Trust Boundary
//! `user_id` in request bodies is taken as given. The public routes are
//! meant for the app backend on a private interface, never for browsers;
//! anyone who can reach them can spend or block another user's quota.
//! The listener binds to loopback unless configured otherwise.

pub mod error;
pub mod handlers;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
