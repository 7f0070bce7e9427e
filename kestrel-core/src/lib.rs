//! Core functionality for the kestrel authentication system.
//!
//! This crate holds the pieces every backend and frontend shares: the
//! [`Account`], [`AuditEntry`], and [`Rules`] entities, the transactional
//! [`StorageProvider`] contract, the pluggable credential hasher, the
//! [`LoginToSystem`] verification pipeline, and the [`TokenAuthority`] that
//! turns successful logins into bearer tokens.
//!
//! Storage backends live in their own crates and implement
//! [`StorageProvider`]; see the workspace root for the available adapters.

pub mod account;
pub mod audit;
pub mod crypto;
pub mod error;
pub mod login;
pub mod rules;
pub mod storage;
pub mod strength;
pub mod token;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use account::Account;
pub use audit::{AuditEntry, AuditTag, LOGIN_USECASE_TAG};
pub use error::{CryptoError, Error, StorageError, TokenError, ValidationError};
pub use login::{LoginResult, LoginToSystem};
pub use rules::Rules;
pub use storage::StorageProvider;
pub use token::TokenAuthority;
