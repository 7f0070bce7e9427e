//! Account authentication with brute-force defense and audit trail.
//!
//! Kestrel authenticates one kind of principal (an account with a password
//! credential) and does it carefully: a fixed verification pipeline with
//! lockout, dormancy, and forced-password-change policies, an append-only
//! audit trail, and a stateless bearer-token authority — all defined
//! against a transactional storage contract with interchangeable backends.
//!
//! # Example
//!
//! ```rust,ignore
//! use kestrel::{Argon2Hasher, LoginToSystem, MemoryStorage, StorageProvider};
//!
//! let mut db = MemoryStorage::new();
//! db.open().await?;
//! // ... add an account through your registration flow ...
//! let hasher = Argon2Hasher;
//! let mut login = LoginToSystem::new(&mut db, &hasher);
//! let result = login.run("fmulder", "TrustNo1", "10.0.0.1", None).await?;
//! assert!(!result.has_failed);
//! ```

pub mod grant;

pub use kestrel_core::{
    account::Account,
    audit::{AuditEntry, AuditTag, LOGIN_USECASE_TAG},
    crypto::{Argon2Hasher, CredentialHasher, SwapcaseHasher},
    error::{CryptoError, Error, StorageError, TokenError, ValidationError},
    login::{LoginResult, LoginToSystem},
    rules::Rules,
    storage::StorageProvider,
    strength::{BasicPasswordChecker, PasswordChecker, PasswordStrength},
    token::TokenAuthority,
};
pub use kestrel_storage_memory::MemoryStorage;
pub use kestrel_storage_sqlite::SqliteStorage;

pub use grant::{TokenIssuer, TokenResponse};
