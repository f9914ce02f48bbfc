//! Permission checks run before any write operation.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{FieldLimits, GuardConfig};
use crate::observability::metrics;
use crate::security::actions::{Action, RateLimitTable};
use crate::security::content::{ContentIssue, ContentValidator};
use crate::security::forms::{self, ContactMessage, FormValidation, PostDraft, ProfileUpdate};
use crate::security::monitor::{EventResult, NewSecurityEvent, SecurityEventType, SecurityMonitor};
use crate::security::rate_limit::{limit_key, RateLimitDecision, RateLimiter};
use crate::security::now_millis;

/// Everything that can change on a config reload.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityPolicy {
    pub limits: RateLimitTable,
    pub validator: ContentValidator,
    pub fields: FieldLimits,
}

impl SecurityPolicy {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            limits: config.rate_limit_table(),
            validator: ContentValidator::new(config.content.max_special_char_ratio),
            fields: config.fields.clone(),
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::from_config(&GuardConfig::default())
    }
}

/// Outcome of [`SecurityMiddleware::check_action_permission`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityCheckResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_in_ms: Option<u64>,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ContentIssue>,
}

impl SecurityCheckResult {
    /// Rejected by the rate limiter rather than by content checks.
    pub fn is_rate_limited(&self) -> bool {
        !self.allowed && self.issues.is_empty()
    }
}

fn rate_limit_message(decision: &RateLimitDecision) -> String {
    if decision.blocked {
        "You have been temporarily blocked. Please try again later.".to_string()
    } else {
        let minutes = decision.reset_in_ms.div_ceil(60_000).max(1);
        format!("Rate limit exceeded. Please try again in {minutes} minute(s).")
    }
}

/// Orchestrates the rate limiter, content validator and monitor.
///
/// Constructed once at startup and shared; [`spawn_maintenance`] starts the
/// cleanup sweep, which stops when the shutdown broadcast fires.
///
/// [`spawn_maintenance`]: SecurityMiddleware::spawn_maintenance
pub struct SecurityMiddleware {
    limiter: Arc<RateLimiter>,
    monitor: Arc<SecurityMonitor>,
    policy: ArcSwap<SecurityPolicy>,
}

impl SecurityMiddleware {
    pub fn new(config: &GuardConfig) -> Self {
        Self::with_parts(
            Arc::new(RateLimiter::new()),
            Arc::new(SecurityMonitor::new(config.monitor.settings())),
            SecurityPolicy::from_config(config),
        )
    }

    pub fn with_parts(
        limiter: Arc<RateLimiter>,
        monitor: Arc<SecurityMonitor>,
        policy: SecurityPolicy,
    ) -> Self {
        Self {
            limiter,
            monitor,
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn monitor(&self) -> &Arc<SecurityMonitor> {
        &self.monitor
    }

    pub fn policy(&self) -> Arc<SecurityPolicy> {
        self.policy.load_full()
    }

    /// Apply a new configuration. Counters and events are kept.
    pub fn reload(&self, config: &GuardConfig) {
        self.policy.store(Arc::new(SecurityPolicy::from_config(config)));
        self.monitor.update_settings(config.monitor.settings());
        tracing::info!("Security policy reloaded");
    }

    /// Start the periodic rate limit sweep.
    pub fn spawn_maintenance(
        &self,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        self.limiter.clone().spawn_cleanup(interval, shutdown)
    }

    /// Decide whether `user_id` may perform `action`, optionally with `content`.
    pub fn check_action_permission(
        &self,
        user_id: Option<&str>,
        action: Action,
        content: Option<&str>,
    ) -> SecurityCheckResult {
        self.check_action_permission_at(user_id, action, content, now_millis())
    }

    pub fn check_action_permission_at(
        &self,
        user_id: Option<&str>,
        action: Action,
        content: Option<&str>,
        now: u64,
    ) -> SecurityCheckResult {
        let policy = self.policy.load();
        let limit = policy.limits.get(action);
        let key = limit_key(user_id, action);
        let decision = self.limiter.check_limit_at(&key, &limit, now);

        if !decision.allowed {
            metrics::record_rate_limited(action.as_str());
            let reason = if decision.blocked {
                "Temporarily blocked"
            } else {
                "Rate limit exceeded"
            };
            self.monitor.log_event_at(
                NewSecurityEvent::new(
                    SecurityEventType::RateLimit,
                    action.as_str(),
                    EventResult::Blocked,
                )
                .user(user_id)
                .reason(reason)
                .metadata(serde_json::json!({
                    "blocked": decision.blocked,
                    "reset_in_ms": decision.reset_in_ms,
                })),
                now,
            );
            return SecurityCheckResult {
                allowed: false,
                error: Some(rate_limit_message(&decision)),
                remaining: Some(0),
                reset_in_ms: Some(decision.reset_in_ms),
                blocked: decision.blocked,
                issues: Vec::new(),
            };
        }

        if let Some(content) = content {
            let report = policy.validator.validate_content(content);
            if !report.is_valid() {
                let message = report.messages().join("; ");
                let event_type = if report.has(ContentIssue::MaliciousCode) {
                    SecurityEventType::XssAttempt
                } else if report.issues.iter().any(ContentIssue::is_injection) {
                    SecurityEventType::InjectionAttempt
                } else {
                    SecurityEventType::ValidationFailed
                };
                let mut event =
                    NewSecurityEvent::new(event_type, action.as_str(), EventResult::Blocked)
                        .user(user_id)
                        .reason(message.clone());
                if event_type == SecurityEventType::InjectionAttempt {
                    let injection_type = if report.has(ContentIssue::SqlInjection) {
                        "sql"
                    } else {
                        "nosql"
                    };
                    event = event.metadata(serde_json::json!({ "injection_type": injection_type }));
                }
                self.monitor.log_event_at(event, now);

                return SecurityCheckResult {
                    allowed: false,
                    error: Some(message),
                    remaining: Some(decision.remaining),
                    reset_in_ms: Some(decision.reset_in_ms),
                    blocked: false,
                    issues: report.issues,
                };
            }
        }

        SecurityCheckResult {
            allowed: true,
            error: None,
            remaining: Some(decision.remaining),
            reset_in_ms: Some(decision.reset_in_ms),
            blocked: false,
            issues: Vec::new(),
        }
    }

    pub fn validate_post_creation(&self, title: &str, content: &str) -> FormValidation<PostDraft> {
        let policy = self.policy.load();
        forms::validate_post_creation(&policy.fields, &policy.validator, title, content)
    }

    pub fn validate_contact_form(
        &self,
        name: &str,
        email: &str,
        message: &str,
    ) -> FormValidation<ContactMessage> {
        let policy = self.policy.load();
        forms::validate_contact_form(&policy.fields, &policy.validator, name, email, message)
    }

    pub fn validate_profile_update(
        &self,
        display_name: &str,
        bio: Option<&str>,
    ) -> FormValidation<ProfileUpdate> {
        let policy = self.policy.load();
        forms::validate_profile_update(&policy.fields, &policy.validator, display_name, bio)
    }

    /// Clear the counters for one user/action pair.
    pub fn reset_limit(&self, user_id: Option<&str>, action: Action) {
        self.limiter.reset(&limit_key(user_id, action));
    }

    /// Block one user/action pair for `duration_ms`.
    pub fn block(&self, user_id: Option<&str>, action: Action, duration_ms: u64) {
        self.limiter.block(&limit_key(user_id, action), duration_ms);
    }
}

impl Default for SecurityMiddleware {
    fn default() -> Self {
        Self::new(&GuardConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::actions::ActionLimit;

    const T0: u64 = 1_700_000_000_000;

    #[test]
    fn test_under_quota_is_allowed() {
        let mw = SecurityMiddleware::default();
        let result = mw.check_action_permission_at(
            Some("u1"),
            Action::PostCreate,
            Some("A lovely afternoon"),
            T0,
        );
        assert!(result.allowed);
        assert_eq!(result.remaining, Some(9));
        assert!(result.error.is_none());
        assert!(mw.monitor().is_empty());
    }

    #[test]
    fn test_script_content_logs_xss_attempt() {
        let mw = SecurityMiddleware::default();
        let result = mw.check_action_permission_at(
            Some("uid"),
            Action::PostCreate,
            Some("<script>x</script>"),
            T0,
        );
        assert!(!result.allowed);
        assert!(!result.is_rate_limited());
        assert!(result.error.as_deref().unwrap().contains("malicious code"));

        let events = mw.monitor().export_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SecurityEventType::XssAttempt);
        assert_eq!(events[0].user_id.as_deref(), Some("uid"));
    }

    #[test]
    fn test_injection_is_split_by_kind() {
        let mw = SecurityMiddleware::default();
        mw.check_action_permission_at(
            Some("u"),
            Action::CommentCreate,
            Some("1 UNION SELECT password"),
            T0,
        );
        mw.check_action_permission_at(Some("u"), Action::CommentCreate, Some("$where this"), T0);

        let events = mw.monitor().export_events();
        assert_eq!(events[0].event_type, SecurityEventType::InjectionAttempt);
        assert_eq!(events[0].metadata.as_ref().unwrap()["injection_type"], "sql");
        assert_eq!(events[1].event_type, SecurityEventType::InjectionAttempt);
        assert_eq!(events[1].metadata.as_ref().unwrap()["injection_type"], "nosql");
    }

    #[test]
    fn test_symbol_noise_is_validation_failure() {
        let mw = SecurityMiddleware::default();
        let result = mw.check_action_permission_at(
            None,
            Action::DiaryCreate,
            Some("!!!???!!!"),
            T0,
        );
        assert!(!result.allowed);
        assert_eq!(result.issues, vec![ContentIssue::ExcessiveSpecialCharacters]);
        assert_eq!(mw.monitor().export_events()[0].event_type, SecurityEventType::ValidationFailed);
    }

    #[test]
    fn test_rate_limit_message_and_event() {
        let mw = SecurityMiddleware::default();
        for i in 0..10 {
            assert!(
                mw.check_action_permission_at(Some("u"), Action::PostCreate, None, T0 + i)
                    .allowed
            );
        }
        let rejected = mw.check_action_permission_at(Some("u"), Action::PostCreate, None, T0 + 10);
        assert!(!rejected.allowed);
        assert!(rejected.is_rate_limited());
        assert!(!rejected.blocked);
        assert!(rejected.error.as_deref().unwrap().starts_with("Rate limit exceeded"));

        let events = mw.monitor().export_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, SecurityEventType::RateLimit);
        assert_eq!(events[0].result, EventResult::Blocked);
    }

    #[test]
    fn test_login_block_message() {
        let mw = SecurityMiddleware::default();
        for i in 0..5 {
            mw.check_action_permission_at(Some("u"), Action::LoginAttempt, None, T0 + i);
        }
        let blocked = mw.check_action_permission_at(Some("u"), Action::LoginAttempt, None, T0 + 5);
        assert!(blocked.blocked);
        assert_eq!(
            blocked.error.as_deref(),
            Some("You have been temporarily blocked. Please try again later.")
        );
        assert_eq!(blocked.reset_in_ms, Some(30 * 60 * 1000));
    }

    #[test]
    fn test_rate_limit_checked_before_content() {
        let mw = SecurityMiddleware::default();
        mw.block(Some("u"), Action::PostCreate, 60_000);
        let result = mw.check_action_permission(Some("u"), Action::PostCreate, Some("<script>"));
        assert!(result.blocked);
        assert!(result.issues.is_empty());
        assert_eq!(mw.monitor().export_events()[0].event_type, SecurityEventType::RateLimit);
    }

    #[test]
    fn test_reload_keeps_counters() {
        let mw = SecurityMiddleware::default();
        for i in 0..3 {
            mw.check_action_permission_at(Some("u"), Action::StoryCreate, None, T0 + i);
        }

        let mut config = GuardConfig::default();
        config
            .rate_limits
            .insert("STORY_CREATE".to_string(), ActionLimit::new(3, 60 * 60 * 1000));
        mw.reload(&config);

        let result = mw.check_action_permission_at(Some("u"), Action::StoryCreate, None, T0 + 4);
        assert!(!result.allowed);
    }

    #[test]
    fn test_reset_limit_restores_quota() {
        let mw = SecurityMiddleware::default();
        for i in 0..4 {
            mw.check_action_permission_at(Some("u"), Action::ContactSubmit, None, T0 + i);
        }
        mw.reset_limit(Some("u"), Action::ContactSubmit);
        let result = mw.check_action_permission_at(Some("u"), Action::ContactSubmit, None, T0 + 5);
        assert!(result.allowed);
        assert_eq!(result.remaining, Some(2));
    }

    #[test]
    fn test_rate_limit_minutes_round_up() {
        let decision = RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_in_ms: 61_000,
            blocked: false,
        };
        assert_eq!(
            rate_limit_message(&decision),
            "Rate limit exceeded. Please try again in 2 minute(s)."
        );
    }
}
