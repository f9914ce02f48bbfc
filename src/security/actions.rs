//! Guarded actions and their default rate limits.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

/// A write operation that must pass the security pipeline first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    LoginAttempt,
    Signup,
    PostCreate,
    CommentCreate,
    StoryCreate,
    DiaryCreate,
    LikeAction,
    ContactSubmit,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::LoginAttempt,
        Action::Signup,
        Action::PostCreate,
        Action::CommentCreate,
        Action::StoryCreate,
        Action::DiaryCreate,
        Action::LikeAction,
        Action::ContactSubmit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::LoginAttempt => "LOGIN_ATTEMPT",
            Action::Signup => "SIGNUP",
            Action::PostCreate => "POST_CREATE",
            Action::CommentCreate => "COMMENT_CREATE",
            Action::StoryCreate => "STORY_CREATE",
            Action::DiaryCreate => "DIARY_CREATE",
            Action::LikeAction => "LIKE_ACTION",
            Action::ContactSubmit => "CONTACT_SUBMIT",
        }
    }

    /// Built-in limit for this action.
    pub fn default_limit(&self) -> ActionLimit {
        match self {
            Action::LoginAttempt => ActionLimit::new(5, 15 * MINUTE_MS).with_block(30 * MINUTE_MS),
            Action::Signup => ActionLimit::new(3, HOUR_MS).with_block(HOUR_MS),
            Action::PostCreate => ActionLimit::new(10, HOUR_MS),
            Action::CommentCreate => ActionLimit::new(30, HOUR_MS),
            Action::StoryCreate => ActionLimit::new(5, HOUR_MS),
            Action::DiaryCreate => ActionLimit::new(20, HOUR_MS),
            Action::LikeAction => ActionLimit::new(100, HOUR_MS),
            Action::ContactSubmit => ActionLimit::new(3, 24 * HOUR_MS),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an action name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// Limit applied to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLimit {
    /// Requests allowed per window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Hard block applied once the window overflows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_duration_ms: Option<u64>,
}

impl ActionLimit {
    pub const fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
            block_duration_ms: None,
        }
    }

    pub const fn with_block(mut self, block_duration_ms: u64) -> Self {
        self.block_duration_ms = Some(block_duration_ms);
        self
    }
}

/// Action → limit lookup table.
///
/// Built from the defaults, then overridden by whatever the config file
/// names. Immutable once built; a reload builds a new table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitTable {
    limits: HashMap<Action, ActionLimit>,
}

impl RateLimitTable {
    /// Apply overrides keyed by action name. Unknown names are skipped;
    /// config validation rejects them before they get here.
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a ActionLimit)>,
    {
        let mut table = Self::default();
        for (name, limit) in overrides {
            match name.parse::<Action>() {
                Ok(action) => {
                    table.limits.insert(action, *limit);
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring rate limit override"),
            }
        }
        table
    }

    pub fn get(&self, action: Action) -> ActionLimit {
        self.limits
            .get(&action)
            .copied()
            .unwrap_or_else(|| action.default_limit())
    }
}

impl Default for RateLimitTable {
    fn default() -> Self {
        Self {
            limits: Action::ALL.into_iter().map(|a| (a, a.default_limit())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_matches_published_limits() {
        let table = RateLimitTable::default();
        let login = table.get(Action::LoginAttempt);
        assert_eq!(login.max_requests, 5);
        assert_eq!(login.window_ms, 15 * 60 * 1000);
        assert_eq!(login.block_duration_ms, Some(30 * 60 * 1000));

        let contact = table.get(Action::ContactSubmit);
        assert_eq!(contact.max_requests, 3);
        assert_eq!(contact.window_ms, 24 * 60 * 60 * 1000);
        assert_eq!(contact.block_duration_ms, None);

        assert_eq!(table.get(Action::LikeAction).max_requests, 100);
    }

    #[test]
    fn test_action_parse_and_display() {
        assert_eq!("POST_CREATE".parse::<Action>().unwrap(), Action::PostCreate);
        assert_eq!("diary_create".parse::<Action>().unwrap(), Action::DiaryCreate);
        assert!("TEA_POUR".parse::<Action>().is_err());
        assert_eq!(Action::CommentCreate.to_string(), "COMMENT_CREATE");
    }

    #[test]
    fn test_overrides_replace_single_rows() {
        let mut overrides = HashMap::new();
        overrides.insert("POST_CREATE".to_string(), ActionLimit::new(2, 1000));
        let table = RateLimitTable::with_overrides(&overrides);
        assert_eq!(table.get(Action::PostCreate), ActionLimit::new(2, 1000));
        assert_eq!(table.get(Action::DiaryCreate).max_requests, 20);
    }

    #[test]
    fn test_action_serde_uses_wire_names() {
        let json = serde_json::to_string(&Action::LoginAttempt).unwrap();
        assert_eq!(json, "\"LOGIN_ATTEMPT\"");
        let parsed: Action = serde_json::from_str("\"LIKE_ACTION\"").unwrap();
        assert_eq!(parsed, Action::LikeAction);
    }
}
