//! Field-set validators run before a document write.
//!
//! Each validator length-checks, sanitizes and content-checks its fields.
//! All of them are pure.

use serde::{Deserialize, Serialize};

use crate::config::FieldLimits;
use crate::security::content::ContentValidator;
use crate::security::sanitize::{
    sanitize_input, validate_email, validate_field_length, MAX_EMAIL_LENGTH,
};

/// Verdict plus the sanitized values the caller should store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormValidation<T> {
    pub valid: bool,
    pub errors: Vec<String>,
    pub sanitized: T,
}

impl<T> FormValidation<T> {
    fn new(errors: Vec<String>, sanitized: T) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            sanitized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Length-check, sanitize and content-check one text field.
fn check_field(
    validator: &ContentValidator,
    errors: &mut Vec<String>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> String {
    errors.extend(validate_field_length(field, value, min, max).errors);
    let clean = sanitize_input(value, max);
    errors.extend(
        validator
            .validate_content(&clean)
            .issues
            .into_iter()
            .map(|issue| format!("{field}: {issue}")),
    );
    clean
}

pub fn validate_post_creation(
    limits: &FieldLimits,
    validator: &ContentValidator,
    title: &str,
    content: &str,
) -> FormValidation<PostDraft> {
    let mut errors = Vec::new();
    let title = check_field(
        validator,
        &mut errors,
        "Title",
        title,
        1,
        limits.post_title_max,
    );
    let content = check_field(
        validator,
        &mut errors,
        "Content",
        content,
        1,
        limits.post_content_max,
    );
    FormValidation::new(errors, PostDraft { title, content })
}

pub fn validate_contact_form(
    limits: &FieldLimits,
    validator: &ContentValidator,
    name: &str,
    email: &str,
    message: &str,
) -> FormValidation<ContactMessage> {
    let mut errors = Vec::new();
    let name = check_field(
        validator,
        &mut errors,
        "Name",
        name,
        1,
        limits.contact_name_max,
    );

    // Length is checked on the unsanitized address.
    let trimmed = email.trim();
    if !validate_email(trimmed) {
        errors.push("Please enter a valid email address".to_string());
    }
    let email = sanitize_input(trimmed, MAX_EMAIL_LENGTH);

    let message = check_field(
        validator,
        &mut errors,
        "Message",
        message,
        limits.contact_message_min,
        limits.contact_message_max,
    );
    FormValidation::new(errors, ContactMessage { name, email, message })
}

pub fn validate_profile_update(
    limits: &FieldLimits,
    validator: &ContentValidator,
    display_name: &str,
    bio: Option<&str>,
) -> FormValidation<ProfileUpdate> {
    let mut errors = Vec::new();
    let display_name = check_field(
        validator,
        &mut errors,
        "Display name",
        display_name,
        limits.display_name_min,
        limits.display_name_max,
    );
    let bio = bio.map(|bio| check_field(validator, &mut errors, "Bio", bio, 0, limits.bio_max));
    FormValidation::new(errors, ProfileUpdate { display_name, bio })
}
