//! Account entity and lockout state.
//!
//! An account is a user identity with a password credential and the state
//! the login pipeline mutates: the dormancy and lock flags, the ongoing
//! password failure count, and the time of the last failure.
//!
//! | Field                            | Type                   | Description                                          |
//! | -------------------------------- | ---------------------- | ---------------------------------------------------- |
//! | `id`                             | `i64`                  | Positive identifier assigned by storage on creation. |
//! | `username`                       | `String`               | Unique login name, validated format.                 |
//! | `display_name`                   | `String`               | Human-readable name.                                 |
//! | `password_hash`                  | `String`               | Opaque credential hash.                              |
//! | `needs_password_change`          | `bool`                 | Password is marked for reset.                        |
//! | `is_locked`                      | `bool`                 | Time-boxed lock after repeated failures.             |
//! | `is_dormant`                     | `bool`                 | Administratively disabled, distinct from locked.     |
//! | `ongoing_password_failure_count` | `i64`                  | Consecutive failures; reset to 0 on success.         |
//! | `last_password_failure_time`     | `Option<DateTime<Utc>>`| Set whenever a failure is recorded.                  |
//!
//! A locked account always has `last_password_failure_time` set; the lock's
//! origin is the timestamp its expiry is computed from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, ValidationError},
    validation::{validate_display_name, validate_id, validate_username},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub needs_password_change: bool,
    pub is_locked: bool,
    pub is_dormant: bool,
    pub ongoing_password_failure_count: i64,
    pub last_password_failure_time: Option<DateTime<Utc>>,
}

impl Account {
    pub fn builder() -> AccountBuilder {
        AccountBuilder::default()
    }

    /// Check the field format rules for this account.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_id(self.id, "id")?;
        validate_username(&self.username)?;
        validate_display_name(&self.display_name)?;
        if self.ongoing_password_failure_count < 0 {
            return Err(ValidationError::InvalidId(
                "ongoing_password_failure_count must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct AccountBuilder {
    id: Option<i64>,
    username: Option<String>,
    display_name: Option<String>,
    password_hash: Option<String>,
    needs_password_change: bool,
    is_locked: bool,
    is_dormant: bool,
    ongoing_password_failure_count: i64,
    last_password_failure_time: Option<DateTime<Utc>>,
}

impl AccountBuilder {
    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }

    pub fn needs_password_change(mut self, needs_password_change: bool) -> Self {
        self.needs_password_change = needs_password_change;
        self
    }

    pub fn is_locked(mut self, is_locked: bool) -> Self {
        self.is_locked = is_locked;
        self
    }

    pub fn is_dormant(mut self, is_dormant: bool) -> Self {
        self.is_dormant = is_dormant;
        self
    }

    pub fn ongoing_password_failure_count(mut self, count: i64) -> Self {
        self.ongoing_password_failure_count = count;
        self
    }

    pub fn last_password_failure_time(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.last_password_failure_time = time;
        self
    }

    pub fn build(self) -> Result<Account, Error> {
        let account = Account {
            id: self
                .id
                .ok_or(ValidationError::MissingField("id".to_string()))?,
            username: self
                .username
                .ok_or(ValidationError::MissingField("username".to_string()))?,
            display_name: self
                .display_name
                .ok_or(ValidationError::MissingField("display name".to_string()))?,
            password_hash: self
                .password_hash
                .ok_or(ValidationError::MissingField("password hash".to_string()))?,
            needs_password_change: self.needs_password_change,
            is_locked: self.is_locked,
            is_dormant: self.is_dormant,
            ongoing_password_failure_count: self.ongoing_password_failure_count,
            last_password_failure_time: self.last_password_failure_time,
        };
        account.validate()?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_builds_valid_account() {
        let account = Account::builder()
            .id(1)
            .username("fmulder")
            .display_name("Fox Mulder")
            .password_hash("hash")
            .build()
            .unwrap();

        assert_eq!(account.id, 1);
        assert_eq!(account.username, "fmulder");
        assert!(!account.needs_password_change);
        assert!(!account.is_locked);
        assert!(!account.is_dormant);
        assert_eq!(account.ongoing_password_failure_count, 0);
        assert!(account.last_password_failure_time.is_none());
    }

    #[test]
    fn test_builder_requires_core_fields() {
        let result = Account::builder().id(1).username("fmulder").build();
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::MissingField(_)))
        ));
    }

    #[test]
    fn test_builder_rejects_bad_username() {
        let result = Account::builder()
            .id(1)
            .username("f")
            .display_name("Fox Mulder")
            .password_hash("hash")
            .build();
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidUsername(_)))
        ));
    }

    #[test]
    fn test_builder_rejects_non_positive_id() {
        let result = Account::builder()
            .id(0)
            .username("fmulder")
            .display_name("Fox Mulder")
            .password_hash("hash")
            .build();
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidId(_)))
        ));
    }
}
