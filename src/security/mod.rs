//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Write request (post, diary entry, comment, ...):
//!     → middleware.rs (check_action_permission)
//!         → rate_limit.rs (per user+action window, hard blocks)
//!         → content.rs (XSS / SQL / NoSQL / obfuscation heuristics)
//!         → monitor.rs (log blocked attempts, threshold alerts)
//!     → allowed / rejected result returned to the caller
//!
//! Form submissions:
//!     → forms.rs (sanitize.rs + length checks + content.rs)
//! ```
//!
//! # Design Decisions
//! - Nothing in the pipeline returns an error; every outcome is a result value
//! - Content heuristics are signal, not a boundary; escaping happens at render time
//! - One limiter per process, shared by all connections

pub mod actions;
pub mod content;
pub mod forms;
pub mod headers;
pub mod middleware;
pub mod monitor;
pub mod rate_limit;
pub mod sanitize;

use std::time::{SystemTime, UNIX_EPOCH};

pub use actions::{Action, ActionLimit, RateLimitTable};
pub use content::{ContentIssue, ContentReport, ContentValidator, ValidationResult};
pub use middleware::{SecurityCheckResult, SecurityMiddleware, SecurityPolicy};
pub use monitor::{
    AlertSink, EventResult, NewSecurityEvent, SecurityAlert, SecurityEvent, SecurityEventType,
    SecurityMonitor, SecurityStats,
};
pub use rate_limit::{RateLimitDecision, RateLimiter};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
