//! Pattern heuristics for untrusted text.
//!
//! These checks classify input as suspicious. They are a false-negative
//! tolerant rule list (trivially bypassed with encodings) and never replace
//! escaping at the render layer.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default upper bound on the share of symbol characters in a text.
pub const DEFAULT_SPECIAL_CHAR_RATIO: f64 = 0.3;

static XSS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<script|javascript:|onerror\s*=|onload\s*=)").expect("valid xss pattern")
});

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|EXECUTE|UNION|DECLARE)\b",
        r"(--|#|/\*|\*/)",
        r"(?i)\b(OR|AND)\b.*=",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid sql pattern"))
    .collect()
});

static NOSQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\$where",
        r"(?i)\$ne\b",
        r"(?i)\$gt\b",
        r"(?i)\$lt\b",
        r"(?i)\$regex",
        r"\{[^}]*\$[^}]*\}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid nosql pattern"))
    .collect()
});

/// A reason a piece of content was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentIssue {
    MaliciousCode,
    SqlInjection,
    NoSqlInjection,
    ExcessiveSpecialCharacters,
}

impl ContentIssue {
    pub fn message(&self) -> &'static str {
        match self {
            ContentIssue::MaliciousCode => "Content contains potentially malicious code",
            ContentIssue::SqlInjection => "Content contains potential SQL injection",
            ContentIssue::NoSqlInjection => "Content contains potential NoSQL injection",
            ContentIssue::ExcessiveSpecialCharacters => {
                "Content contains excessive special characters"
            }
        }
    }

    pub fn is_injection(&self) -> bool {
        matches!(self, ContentIssue::SqlInjection | ContentIssue::NoSqlInjection)
    }
}

impl fmt::Display for ContentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Generic pass/fail outcome with display-ready messages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Typed outcome of [`ContentValidator::validate_content`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentReport {
    pub issues: Vec<ContentIssue>,
}

impl ContentReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has(&self, issue: ContentIssue) -> bool {
        self.issues.contains(&issue)
    }

    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.message().to_string()).collect()
    }
}

impl From<ContentReport> for ValidationResult {
    fn from(report: ContentReport) -> Self {
        ValidationResult::from_errors(report.messages())
    }
}

/// Runs every heuristic against a piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentValidator {
    max_special_char_ratio: f64,
}

impl ContentValidator {
    pub fn new(max_special_char_ratio: f64) -> Self {
        Self {
            max_special_char_ratio,
        }
    }

    /// Check `content` against all rules. Every rule runs; issues are
    /// reported in a fixed order.
    pub fn validate_content(&self, content: &str) -> ContentReport {
        let mut issues = Vec::new();

        if contains_xss(content) {
            issues.push(ContentIssue::MaliciousCode);
        }
        if contains_sql_injection(content) {
            issues.push(ContentIssue::SqlInjection);
        }
        if contains_nosql_injection(content) {
            issues.push(ContentIssue::NoSqlInjection);
        }
        if special_char_ratio(content).is_some_and(|ratio| ratio > self.max_special_char_ratio) {
            issues.push(ContentIssue::ExcessiveSpecialCharacters);
        }

        ContentReport { issues }
    }
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(DEFAULT_SPECIAL_CHAR_RATIO)
    }
}

pub fn contains_xss(content: &str) -> bool {
    XSS_PATTERN.is_match(content)
}

pub fn contains_sql_injection(content: &str) -> bool {
    SQL_PATTERNS.iter().any(|p| p.is_match(content))
}

pub fn contains_nosql_injection(content: &str) -> bool {
    NOSQL_PATTERNS.iter().any(|p| p.is_match(content))
}

/// Share of characters that are neither alphanumeric nor whitespace.
/// `None` for empty input.
pub fn special_char_ratio(content: &str) -> Option<f64> {
    let total = content.chars().count();
    if total == 0 {
        return None;
    }
    let special = content
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    Some(special as f64 / total as f64)
}
