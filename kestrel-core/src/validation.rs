//! Field validation rules shared across the crate.
//!
//! Single source of truth for the format rules on usernames, display names,
//! identifiers, and audit text, so entities and storage adapters agree on
//! what constitutes a well-formed record.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

pub const USERNAME_MIN_LENGTH: usize = 4;
pub const USERNAME_MAX_LENGTH: usize = 20;
pub const DISPLAY_NAME_MIN_LENGTH: usize = 4;
pub const DISPLAY_NAME_MAX_LENGTH: usize = 50;
pub const AUDIT_TEXT_MIN_LENGTH: usize = 1;
pub const AUDIT_TEXT_MAX_LENGTH: usize = 200;

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.]*[a-zA-Z0-9]$").expect("Invalid username regex pattern")
});

static DISPLAY_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9 .,'-]*$").expect("Invalid display name regex pattern")
});

/// Validates a username.
///
/// Usernames are 4-20 characters, alphanumeric with optional underscore and
/// period separators, and must start and end with an alphanumeric character.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::MissingField("username".to_string()));
    }

    if username.len() < USERNAME_MIN_LENGTH || username.len() > USERNAME_MAX_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "username must be between {USERNAME_MIN_LENGTH} and {USERNAME_MAX_LENGTH} characters long"
        )));
    }

    if USERNAME_REGEX.is_match(username) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUsername(
            "username must be alphanumeric characters with optional underscore and period separators"
                .to_string(),
        ))
    }
}

/// Validates a display name (4-50 characters, letters, digits, and regular
/// punctuation).
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::MissingField("display name".to_string()));
    }

    if name.len() < DISPLAY_NAME_MIN_LENGTH || name.len() > DISPLAY_NAME_MAX_LENGTH {
        return Err(ValidationError::InvalidDisplayName(format!(
            "display name must be between {DISPLAY_NAME_MIN_LENGTH} and {DISPLAY_NAME_MAX_LENGTH} characters long"
        )));
    }

    if DISPLAY_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDisplayName(
            "display name must be alphanumeric characters with regular punctuation".to_string(),
        ))
    }
}

/// Validates a storage-assigned identifier. Ids are positive integers.
pub fn validate_id(id: i64, field_name: &str) -> Result<(), ValidationError> {
    if id < 1 {
        return Err(ValidationError::InvalidId(format!(
            "{field_name} must be a positive integer"
        )));
    }
    Ok(())
}

/// Validates the human-readable text of an audit entry (1-200 characters).
pub fn validate_audit_text(text: &str) -> Result<(), ValidationError> {
    if text.len() < AUDIT_TEXT_MIN_LENGTH || text.len() > AUDIT_TEXT_MAX_LENGTH {
        return Err(ValidationError::InvalidText(format!(
            "audit text must be between {AUDIT_TEXT_MIN_LENGTH} and {AUDIT_TEXT_MAX_LENGTH} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("fmulder").is_ok());
        assert!(validate_username("dana.scully").is_ok());
        assert!(validate_username("agent_99").is_ok());
        assert!(validate_username("abcd").is_ok()); // minimum length
    }

    #[test]
    fn test_validate_username_invalid() {
        assert!(validate_username("").is_err());
        assert!(validate_username("abc").is_err()); // too short
        assert!(validate_username(&"a".repeat(21)).is_err()); // too long
        assert!(validate_username("_mulder").is_err()); // leading separator
        assert!(validate_username("mulder.").is_err()); // trailing separator
        assert!(validate_username("fox mulder").is_err()); // whitespace
        assert!(validate_username("fox@mulder").is_err());
    }

    #[test]
    fn test_validate_display_name_valid() {
        assert!(validate_display_name("Fox Mulder").is_ok());
        assert!(validate_display_name("O'Brien, Miles").is_ok());
        assert!(validate_display_name("Jean-Luc Picard").is_ok());
    }

    #[test]
    fn test_validate_display_name_invalid() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("Fox").is_err()); // too short
        assert!(validate_display_name(&"a".repeat(51)).is_err()); // too long
        assert!(validate_display_name("Fox <Mulder>").is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id(1, "id").is_ok());
        assert!(validate_id(i64::MAX, "id").is_ok());
        assert!(validate_id(0, "id").is_err());
        assert!(validate_id(-1, "account_id").is_err());
    }

    #[test]
    fn test_validate_audit_text() {
        assert!(validate_audit_text("x").is_ok());
        assert!(validate_audit_text(&"x".repeat(200)).is_ok());
        assert!(validate_audit_text("").is_err());
        assert!(validate_audit_text(&"x".repeat(201)).is_err());
    }
}
