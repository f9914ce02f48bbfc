//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::security::actions::{ActionLimit, RateLimitTable};
use crate::security::content::DEFAULT_SPECIAL_CHAR_RATIO;
use crate::security::monitor::{
    MonitorSettings, SecurityEventType, DEFAULT_ALERT_WINDOW_MS, DEFAULT_MAX_EVENTS,
};

/// Root configuration for the security guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-action overrides of the built-in rate limit table, keyed by
    /// action name (e.g. `POST_CREATE`).
    pub rate_limits: HashMap<String, ActionLimit>,

    /// Rate limiter housekeeping.
    pub rate_limiter: RateLimiterConfig,

    /// Content heuristics.
    pub content: ContentConfig,

    /// Field length limits for the form validators.
    pub fields: FieldLimits,

    /// Security event monitor.
    pub monitor: MonitorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

impl GuardConfig {
    /// Built-in limits with this config's overrides applied.
    pub fn rate_limit_table(&self) -> RateLimitTable {
        RateLimitTable::with_overrides(&self.rate_limits)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address. Defaults to loopback: callers are the app backend,
    /// which vouches for the `user_id` it sends.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiter housekeeping.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Seconds between sweeps of expired entries.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 5 * 60,
        }
    }
}

/// Content heuristic tuning.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ContentConfig {
    /// Share of symbol characters above which content is flagged.
    pub max_special_char_ratio: f64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_special_char_ratio: DEFAULT_SPECIAL_CHAR_RATIO,
        }
    }
}

/// Character limits used by the form validators.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FieldLimits {
    pub post_title_max: usize,
    pub post_content_max: usize,
    pub contact_name_max: usize,
    pub contact_message_min: usize,
    pub contact_message_max: usize,
    pub display_name_min: usize,
    pub display_name_max: usize,
    pub bio_max: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            post_title_max: 200,
            post_content_max: 10_000,
            contact_name_max: 100,
            contact_message_min: 10,
            contact_message_max: 5_000,
            display_name_min: 2,
            display_name_max: 50,
            bio_max: 500,
        }
    }
}

/// Security event monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Events kept in memory; the oldest are dropped first.
    pub max_events: usize,

    /// Trailing window for alert thresholds in milliseconds.
    pub alert_window_ms: u64,

    /// Threshold overrides keyed by event type (e.g. `rate_limit`).
    pub alert_thresholds: HashMap<String, usize>,
}

impl MonitorConfig {
    /// Resolve into monitor settings. Unknown event types are skipped;
    /// validation reports them.
    pub fn settings(&self) -> MonitorSettings {
        let mut settings = MonitorSettings {
            max_events: self.max_events,
            alert_window_ms: self.alert_window_ms,
            ..MonitorSettings::default()
        };
        for (name, threshold) in &self.alert_thresholds {
            if let Ok(event_type) = name.parse::<SecurityEventType>() {
                settings.thresholds.insert(event_type, *threshold);
            }
        }
        settings
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            alert_window_ms: DEFAULT_ALERT_WINDOW_MS,
            alert_thresholds: HashMap::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of pretty text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 256 * 1024, // 256KB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::actions::Action;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GuardConfig = toml::from_str("").unwrap();
        assert_eq!(config, GuardConfig::default());
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.monitor.max_events, 1000);
    }

    #[test]
    fn test_overrides_parse() {
        let config: GuardConfig = toml::from_str(
            r#"
            [rate_limits.POST_CREATE]
            max_requests = 2
            window_ms = 60000

            [rate_limits.LOGIN_ATTEMPT]
            max_requests = 3
            window_ms = 60000
            block_duration_ms = 120000

            [monitor]
            max_events = 50

            [monitor.alert_thresholds]
            rate_limit = 3

            [fields]
            bio_max = 120
            "#,
        )
        .unwrap();

        let table = config.rate_limit_table();
        assert_eq!(table.get(Action::PostCreate), ActionLimit::new(2, 60_000));
        assert_eq!(table.get(Action::LoginAttempt).block_duration_ms, Some(120_000));
        assert_eq!(table.get(Action::DiaryCreate).max_requests, 20);

        let settings = config.monitor.settings();
        assert_eq!(settings.max_events, 50);
        assert_eq!(settings.threshold(SecurityEventType::RateLimit), 3);
        assert_eq!(settings.threshold(SecurityEventType::XssAttempt), 1);

        assert_eq!(config.fields.bio_max, 120);
        assert_eq!(config.fields.post_title_max, 200);
    }
}
