//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → SecurityMiddleware builds its policy from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server applies it via SecurityMiddleware::reload (atomic policy swap)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener and metrics addresses are read once at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError, CONFIG_ENV_VAR};
pub use schema::{
    AdminConfig, ContentConfig, FieldLimits, GuardConfig, ListenerConfig, MonitorConfig,
    ObservabilityConfig, RateLimiterConfig, SecurityConfig, TimeoutConfig,
};
