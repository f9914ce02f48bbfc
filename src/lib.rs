//! Parlour Guard: rate limiting, content screening and security event
//! monitoring for a diary/social app, exposed as a library and an HTTP service.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::SecurityMiddleware;
