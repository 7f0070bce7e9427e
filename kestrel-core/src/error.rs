use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Errors raised by [`StorageProvider`](crate::storage::StorageProvider)
/// implementations.
///
/// `AlreadyOpen` and `Closed` signal lifecycle misuse by the caller and are
/// programmer errors; the remaining variants are runtime conditions the
/// caller is expected to handle.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("datastore connection is already open")]
    AlreadyOpen,

    #[error("datastore connection is closed")]
    Closed,

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("datastore has no records")]
    Empty,

    #[error("duplicate record: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("Invalid audit text: {0}")]
    InvalidText(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

/// Token validation failures with their stable API error codes.
///
/// The `Display` strings are the exact client-facing messages; the reasons
/// carried by `Invalid` and `Internal` are logged but never sent to the
/// client.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("An authorization token is required.")]
    Missing,

    #[error("The provided authorization token is invalid.")]
    Invalid { reason: String },

    #[error("The authorization token has expired.")]
    Expired { expire_time: Option<DateTime<Utc>> },

    #[error("An unexpected error occurred when processing the authorization token.")]
    Internal { reason: String },
}

impl TokenError {
    pub fn error_code(&self) -> u8 {
        match self {
            TokenError::Missing => 1,
            TokenError::Invalid { .. } => 3,
            TokenError::Expired { .. } => 4,
            TokenError::Internal { .. } => 5,
        }
    }
}

impl Error {
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_token_error(&self) -> bool {
        matches!(self, Error::Token(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let storage_error = Error::Storage(StorageError::Closed);
        assert_eq!(
            storage_error.to_string(),
            "Storage error: datastore connection is closed"
        );

        let not_found = Error::Storage(StorageError::NotFound(
            "account (username=fmulder)".to_string(),
        ));
        assert_eq!(
            not_found.to_string(),
            "Storage error: record not found: account (username=fmulder)"
        );

        let validation_error = Error::Validation(ValidationError::MissingField(
            "username".to_string(),
        ));
        assert_eq!(
            validation_error.to_string(),
            "Validation error: Missing required field: username"
        );
    }

    #[test]
    fn test_token_error_codes() {
        assert_eq!(TokenError::Missing.error_code(), 1);
        assert_eq!(
            TokenError::Invalid {
                reason: "bad signature".to_string()
            }
            .error_code(),
            3
        );
        assert_eq!(TokenError::Expired { expire_time: None }.error_code(), 4);
        assert_eq!(
            TokenError::Internal {
                reason: "account vanished".to_string()
            }
            .error_code(),
            5
        );
    }

    #[test]
    fn test_token_error_messages_hide_reasons() {
        let invalid = TokenError::Invalid {
            reason: "signature verification failed on segment 2".to_string(),
        };
        assert_eq!(
            invalid.to_string(),
            "The provided authorization token is invalid."
        );

        let internal = TokenError::Internal {
            reason: "record not found: account (id=42)".to_string(),
        };
        assert_eq!(
            internal.to_string(),
            "An unexpected error occurred when processing the authorization token."
        );
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = StorageError::AlreadyOpen.into();
        assert!(matches!(error, Error::Storage(StorageError::AlreadyOpen)));
        assert!(error.is_storage_error());

        let error: Error = TokenError::Missing.into();
        assert!(error.is_token_error());
        assert!(!error.is_validation_error());
    }
}
