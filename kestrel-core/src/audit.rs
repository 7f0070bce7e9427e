//! Append-only audit trail of security-relevant events.
//!
//! Every denial or success in the login pipeline leaves exactly one audit
//! entry behind, so the history of an account's authentication activity can
//! be reconstructed from the log alone. Entries are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, ValidationError},
    validation::{validate_audit_text, validate_id},
};

/// Usecase tag stamped on every entry the login pipeline writes.
pub const LOGIN_USECASE_TAG: &str = "login_to_system";

/// The closed set of audit event tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditTag {
    DormantUser,
    LockedUser,
    MustChangePassword,
    UnfitPassword,
    UnknownUser,
    UserLogin,
    WrongPassword,
}

impl AuditTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditTag::DormantUser => "dormant_user",
            AuditTag::LockedUser => "locked_user",
            AuditTag::MustChangePassword => "must_change_password",
            AuditTag::UnfitPassword => "unfit_password",
            AuditTag::UnknownUser => "unknown_user",
            AuditTag::UserLogin => "user_login",
            AuditTag::WrongPassword => "wrong_password",
        }
    }
}

impl std::fmt::Display for AuditTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditTag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dormant_user" => Ok(AuditTag::DormantUser),
            "locked_user" => Ok(AuditTag::LockedUser),
            "must_change_password" => Ok(AuditTag::MustChangePassword),
            "unfit_password" => Ok(AuditTag::UnfitPassword),
            "unknown_user" => Ok(AuditTag::UnknownUser),
            "user_login" => Ok(AuditTag::UserLogin),
            "wrong_password" => Ok(AuditTag::WrongPassword),
            other => Err(ValidationError::InvalidText(format!(
                "unknown audit tag: {other}"
            ))),
        }
    }
}

/// A single record in the audit trail.
///
/// `account_id` is `None` when the event could not be attributed to an
/// account, such as a login attempt with an unknown username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub account_id: Option<i64>,
    pub tag: AuditTag,
    pub text: String,
    pub usecase_tag: String,
}

impl AuditEntry {
    pub fn builder() -> AuditEntryBuilder {
        AuditEntryBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_id(self.id, "id")?;
        if let Some(account_id) = self.account_id {
            validate_id(account_id, "account_id")?;
        }
        validate_audit_text(&self.text)?;
        if self.usecase_tag.is_empty() {
            return Err(ValidationError::MissingField("usecase tag".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct AuditEntryBuilder {
    id: Option<i64>,
    time: Option<DateTime<Utc>>,
    account_id: Option<i64>,
    tag: Option<AuditTag>,
    text: Option<String>,
    usecase_tag: Option<String>,
}

impl AuditEntryBuilder {
    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn account_id(mut self, account_id: Option<i64>) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn tag(mut self, tag: AuditTag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn usecase_tag(mut self, usecase_tag: impl Into<String>) -> Self {
        self.usecase_tag = Some(usecase_tag.into());
        self
    }

    pub fn build(self) -> Result<AuditEntry, Error> {
        let entry = AuditEntry {
            id: self.id.ok_or(ValidationError::MissingField("id".to_string()))?,
            time: self.time.unwrap_or_else(Utc::now),
            account_id: self.account_id,
            tag: self.tag.ok_or(ValidationError::MissingField("tag".to_string()))?,
            text: self
                .text
                .ok_or(ValidationError::MissingField("text".to_string()))?,
            usecase_tag: self
                .usecase_tag
                .unwrap_or_else(|| LOGIN_USECASE_TAG.to_string()),
        };
        entry.validate()?;
        Ok(entry)
    }
}
