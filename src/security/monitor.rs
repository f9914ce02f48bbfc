//! Bounded security event log with threshold alerting.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observability::metrics;
use crate::security::now_millis;

/// Default number of events retained.
pub const DEFAULT_MAX_EVENTS: usize = 1000;

/// Default trailing window for alert thresholds.
pub const DEFAULT_ALERT_WINDOW_MS: u64 = 60 * 60 * 1000;

/// Number of users listed in [`SecurityStats::top_users`].
const TOP_USERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    RateLimit,
    ValidationFailed,
    XssAttempt,
    InjectionAttempt,
    UnauthorizedAccess,
    SuspiciousActivity,
    AuthenticationFailed,
}

impl SecurityEventType {
    pub const ALL: [SecurityEventType; 7] = [
        SecurityEventType::RateLimit,
        SecurityEventType::ValidationFailed,
        SecurityEventType::XssAttempt,
        SecurityEventType::InjectionAttempt,
        SecurityEventType::UnauthorizedAccess,
        SecurityEventType::SuspiciousActivity,
        SecurityEventType::AuthenticationFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::RateLimit => "rate_limit",
            SecurityEventType::ValidationFailed => "validation_failed",
            SecurityEventType::XssAttempt => "xss_attempt",
            SecurityEventType::InjectionAttempt => "injection_attempt",
            SecurityEventType::UnauthorizedAccess => "unauthorized_access",
            SecurityEventType::SuspiciousActivity => "suspicious_activity",
            SecurityEventType::AuthenticationFailed => "authentication_failed",
        }
    }

    /// Events of this type within the alert window that trigger an alert.
    pub fn default_alert_threshold(&self) -> usize {
        match self {
            SecurityEventType::XssAttempt | SecurityEventType::InjectionAttempt => 1,
            SecurityEventType::UnauthorizedAccess => 3,
            SecurityEventType::ValidationFailed
            | SecurityEventType::SuspiciousActivity
            | SecurityEventType::AuthenticationFailed => 5,
            SecurityEventType::RateLimit => 10,
        }
    }
}

impl FromStr for SecurityEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecurityEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown security event type: {s}"))
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventResult {
    Allowed,
    Blocked,
    Error,
}

impl EventResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventResult::Allowed => "allowed",
            EventResult::Blocked => "blocked",
            EventResult::Error => "error",
        }
    }
}

/// A recorded security event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    /// Epoch ms, assigned by the monitor.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub event_type: SecurityEventType,
    pub action: String,
    pub result: EventResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// An event as submitted by a caller, before it is stamped.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSecurityEvent {
    pub user_id: Option<String>,
    pub event_type: SecurityEventType,
    pub action: String,
    pub result: EventResult,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewSecurityEvent {
    pub fn new(
        event_type: SecurityEventType,
        action: impl Into<String>,
        result: EventResult,
    ) -> Self {
        Self {
            user_id: None,
            event_type,
            action: action.into(),
            result,
            reason: None,
            metadata: None,
        }
    }

    pub fn user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_string);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Raised when an event type crosses its threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityAlert {
    pub event_type: SecurityEventType,
    pub user_id: Option<String>,
    pub count: usize,
    pub threshold: usize,
    pub window_ms: u64,
}

/// Destination for alerts.
pub trait AlertSink: Send + Sync {
    fn alert(&self, alert: &SecurityAlert);
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn alert(&self, alert: &SecurityAlert) {
        tracing::warn!(
            event_type = %alert.event_type,
            user_id = alert.user_id.as_deref().unwrap_or("-"),
            count = alert.count,
            threshold = alert.threshold,
            "Security alert threshold reached"
        );
    }
}

/// Monitor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub max_events: usize,
    pub alert_window_ms: u64,
    pub thresholds: HashMap<SecurityEventType, usize>,
}

impl MonitorSettings {
    pub fn threshold(&self, event_type: SecurityEventType) -> usize {
        self.thresholds
            .get(&event_type)
            .copied()
            .unwrap_or_else(|| event_type.default_alert_threshold())
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            alert_window_ms: DEFAULT_ALERT_WINDOW_MS,
            thresholds: SecurityEventType::ALL
                .into_iter()
                .map(|t| (t, t.default_alert_threshold()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEventCount {
    pub user_id: String,
    pub count: usize,
}

/// Aggregates over a trailing window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SecurityStats {
    pub window_ms: u64,
    pub total_events: usize,
    pub blocked_events: usize,
    pub allowed_events: usize,
    pub events_by_type: BTreeMap<SecurityEventType, usize>,
    pub top_users: Vec<UserEventCount>,
}

/// In-memory security event log.
pub struct SecurityMonitor {
    events: Mutex<VecDeque<SecurityEvent>>,
    settings: Mutex<MonitorSettings>,
    sink: Arc<dyn AlertSink>,
}

impl SecurityMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self::with_sink(settings, Arc::new(TracingAlertSink))
    }

    pub fn with_sink(settings: MonitorSettings, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(
                settings.max_events.min(DEFAULT_MAX_EVENTS),
            )),
            settings: Mutex::new(settings),
            sink,
        }
    }

    fn events(&self) -> MutexGuard<'_, VecDeque<SecurityEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings(&self) -> MonitorSettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the tuning. Shrinking `max_events` trims the oldest events.
    pub fn update_settings(&self, settings: MonitorSettings) {
        let max_events = settings.max_events;
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings;
        let mut events = self.events();
        while events.len() > max_events {
            events.pop_front();
        }
    }

    /// Stamp and store an event, then evaluate its alert threshold.
    pub fn log_event(&self, event: NewSecurityEvent) -> SecurityEvent {
        self.log_event_at(event, now_millis())
    }

    pub fn log_event_at(&self, event: NewSecurityEvent, now: u64) -> SecurityEvent {
        let max_events = self.settings().max_events;
        let stored = SecurityEvent {
            id: Uuid::new_v4(),
            timestamp: now,
            user_id: event.user_id,
            event_type: event.event_type,
            action: event.action,
            result: event.result,
            reason: event.reason,
            metadata: event.metadata,
        };

        tracing::info!(
            event_type = %stored.event_type,
            action = %stored.action,
            result = stored.result.as_str(),
            user_id = stored.user_id.as_deref().unwrap_or("-"),
            reason = stored.reason.as_deref().unwrap_or(""),
            "Security event"
        );
        metrics::record_security_event(stored.event_type.as_str(), stored.result.as_str());

        let buffered = {
            let mut events = self.events();
            events.push_back(stored.clone());
            while events.len() > max_events {
                events.pop_front();
            }
            events.len()
        };
        metrics::record_event_buffer(buffered);

        self.check_alert_threshold_at(stored.event_type, stored.user_id.as_deref(), now);
        stored
    }

    /// Count recent events of `event_type` (for `user_id` when given) and
    /// raise an alert once the configured threshold is reached.
    pub fn check_alert_threshold(
        &self,
        event_type: SecurityEventType,
        user_id: Option<&str>,
    ) -> bool {
        self.check_alert_threshold_at(event_type, user_id, now_millis())
    }

    pub fn check_alert_threshold_at(
        &self,
        event_type: SecurityEventType,
        user_id: Option<&str>,
        now: u64,
    ) -> bool {
        let settings = self.settings();
        let since = now.saturating_sub(settings.alert_window_ms);
        let count = self
            .events()
            .iter()
            .filter(|e| {
                e.event_type == event_type
                    && e.timestamp >= since
                    && user_id.map_or(true, |u| e.user_id.as_deref() == Some(u))
            })
            .count();

        let threshold = settings.threshold(event_type);
        if count >= threshold {
            self.trigger_alert(SecurityAlert {
                event_type,
                user_id: user_id.map(str::to_string),
                count,
                threshold,
                window_ms: settings.alert_window_ms,
            });
            true
        } else {
            false
        }
    }

    fn trigger_alert(&self, alert: SecurityAlert) {
        metrics::record_alert(alert.event_type.as_str());
        self.sink.alert(&alert);
    }

    /// Aggregate events newer than `window_ms`.
    pub fn get_stats(&self, window_ms: u64) -> SecurityStats {
        self.get_stats_at(window_ms, now_millis())
    }

    pub fn get_stats_at(&self, window_ms: u64, now: u64) -> SecurityStats {
        let since = now.saturating_sub(window_ms);
        let mut stats = SecurityStats {
            window_ms,
            ..SecurityStats::default()
        };
        let mut per_user: HashMap<String, usize> = HashMap::new();

        for event in self.events().iter().filter(|e| e.timestamp >= since) {
            stats.total_events += 1;
            match event.result {
                EventResult::Blocked => stats.blocked_events += 1,
                EventResult::Allowed => stats.allowed_events += 1,
                EventResult::Error => {}
            }
            *stats.events_by_type.entry(event.event_type).or_default() += 1;
            if let Some(user) = &event.user_id {
                *per_user.entry(user.clone()).or_default() += 1;
            }
        }

        let mut users: Vec<UserEventCount> = per_user
            .into_iter()
            .map(|(user_id, count)| UserEventCount { user_id, count })
            .collect();
        users.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user_id.cmp(&b.user_id)));
        users.truncate(TOP_USERS);
        stats.top_users = users;
        stats
    }

    /// Copy of every buffered event, oldest first.
    pub fn export_events(&self) -> Vec<SecurityEvent> {
        self.events().iter().cloned().collect()
    }

    /// The most recent `limit` events for `user_id`, oldest first.
    pub fn get_user_events(&self, user_id: &str, limit: usize) -> Vec<SecurityEvent> {
        let events = self.events();
        let mut recent: Vec<SecurityEvent> = events
            .iter()
            .rev()
            .filter(|e| e.user_id.as_deref() == Some(user_id))
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    pub fn clear(&self) {
        self.events().clear();
        metrics::record_event_buffer(0);
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }
}

impl Default for SecurityMonitor {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}

impl fmt::Debug for SecurityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityMonitor")
            .field("events", &self.len())
            .finish_non_exhaustive()
    }
}
