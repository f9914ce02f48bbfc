//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that override keys name real actions and event types
//! - Validate value ranges (windows > 0, ratios in (0, 1], addresses parse)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::security::actions::Action;
use crate::security::monitor::SecurityEventType;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("unknown action in rate_limits: {0}")]
    UnknownAction(String),

    #[error("rate limit for {action}: {reason}")]
    InvalidLimit { action: String, reason: &'static str },

    #[error("unknown event type in monitor.alert_thresholds: {0}")]
    UnknownEventType(String),

    #[error("monitor.alert_thresholds.{0} must be greater than zero")]
    ZeroThreshold(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("content.max_special_char_ratio must be in (0, 1], got {0}")]
    InvalidRatio(String),

    #[error("fields.{field}: minimum {min} exceeds maximum {max}")]
    InvertedRange { field: &'static str, min: usize, max: usize },

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    EmptyApiKey,
}

/// Collect every semantic problem in `config`.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    for (name, limit) in &config.rate_limits {
        if name.parse::<Action>().is_err() {
            errors.push(ValidationError::UnknownAction(name.clone()));
            continue;
        }
        if limit.max_requests == 0 {
            errors.push(ValidationError::InvalidLimit {
                action: name.clone(),
                reason: "max_requests must be greater than zero",
            });
        }
        if limit.window_ms == 0 {
            errors.push(ValidationError::InvalidLimit {
                action: name.clone(),
                reason: "window_ms must be greater than zero",
            });
        }
        if limit.block_duration_ms == Some(0) {
            errors.push(ValidationError::InvalidLimit {
                action: name.clone(),
                reason: "block_duration_ms must be greater than zero when set",
            });
        }
    }

    for (name, threshold) in &config.monitor.alert_thresholds {
        if name.parse::<SecurityEventType>().is_err() {
            errors.push(ValidationError::UnknownEventType(name.clone()));
        } else if *threshold == 0 {
            errors.push(ValidationError::ZeroThreshold(name.clone()));
        }
    }

    let zero_checks = [
        ("timeouts.request_secs", config.timeouts.request_secs == 0),
        ("rate_limiter.cleanup_interval_secs", config.rate_limiter.cleanup_interval_secs == 0),
        ("monitor.max_events", config.monitor.max_events == 0),
        ("monitor.alert_window_ms", config.monitor.alert_window_ms == 0),
        ("security.max_body_size", config.security.max_body_size == 0),
    ];
    errors.extend(
        zero_checks
            .into_iter()
            .filter(|(_, is_zero)| *is_zero)
            .map(|(field, _)| ValidationError::Zero { field }),
    );

    let ratio = config.content.max_special_char_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        errors.push(ValidationError::InvalidRatio(ratio.to_string()));
    }

    let fields = &config.fields;
    let ranges = [
        ("contact_message", fields.contact_message_min, fields.contact_message_max),
        ("display_name", fields.display_name_min, fields.display_name_max),
    ];
    for (field, min, max) in ranges {
        if min > max {
            errors.push(ValidationError::InvertedRange { field, min, max });
        }
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
