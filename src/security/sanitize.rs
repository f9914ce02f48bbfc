//! Input normalisation and field-level validators.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::security::content::ValidationResult;

/// Longest address accepted by [`validate_email`].
pub const MAX_EMAIL_LENGTH: usize = 254;

pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Trim, truncate to `max_length` characters, then drop C0/C1 control
/// characters.
pub fn sanitize_input(input: &str, max_length: usize) -> String {
    input
        .trim()
        .chars()
        .take(max_length)
        .filter(|c| !is_control(*c))
        .collect()
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

/// Entity-encode the characters that matter inside HTML text and
/// attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            other => out.push(other),
        }
    }
    out
}

pub fn validate_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(email)
}

/// Password strength verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub strength: PasswordStrength,
}

/// Check a password against the minimum rules and grade it.
///
/// Length, lowercase, uppercase and a digit are required. A symbol and a
/// length of 12 or more only raise the grade: up to three satisfied
/// criteria is weak, four or five is medium, all six is strong.
pub fn validate_password(password: &str) -> PasswordReport {
    let length = password.chars().count();
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    let mut errors = Vec::new();
    if length < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    if !has_lower {
        errors.push("Password must contain a lowercase letter".to_string());
    }
    if !has_upper {
        errors.push("Password must contain an uppercase letter".to_string());
    }
    if !has_digit {
        errors.push("Password must contain a number".to_string());
    }

    let score = [
        length >= MIN_PASSWORD_LENGTH,
        has_lower,
        has_upper,
        has_digit,
        has_symbol,
        length >= 12,
    ]
    .into_iter()
    .filter(|ok| *ok)
    .count();

    let strength = match score {
        0..=3 => PasswordStrength::Weak,
        4 | 5 => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    };

    PasswordReport {
        valid: errors.is_empty(),
        errors,
        strength,
    }
}

/// Check the trimmed character count of `content` against `[min, max]`.
pub fn validate_length(content: &str, min: usize, max: usize) -> ValidationResult {
    validate_field_length("Content", content, min, max)
}

/// [`validate_length`] with a field name in the messages.
pub fn validate_field_length(
    field: &str,
    content: &str,
    min: usize,
    max: usize,
) -> ValidationResult {
    let length = content.trim().chars().count();
    let mut errors = Vec::new();
    if length < min {
        errors.push(format!("{field} must be at least {min} characters"));
    }
    if length > max {
        errors.push(format!("{field} must be no more than {max} characters"));
    }
    ValidationResult::from_errors(errors)
}
