//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build SecurityMiddleware → Start sweep → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → sweep stops, server drains → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One broadcast channel reaches every background task
//! - The security middleware is created at startup and dropped at shutdown;
//!   nothing is global

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
