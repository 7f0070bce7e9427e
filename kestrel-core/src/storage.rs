//! The transactional storage contract.
//!
//! Every backing store implements the single [`StorageProvider`] trait; the
//! login pipeline and token authority are written against it and must behave
//! identically no matter which implementation backs them. The shared
//! behavioral test suite runs against every implementation.
//!
//! # Lifecycle
//!
//! A provider starts `Closed`. [`open`](StorageProvider::open) moves it to
//! `Open` (failing with [`StorageError::AlreadyOpen`] if it already is) and
//! [`close`](StorageProvider::close) moves it back (failing with
//! [`StorageError::Closed`] if it already is). Every data-access method
//! fails with [`StorageError::Closed`] outside `Open`.
//!
//! # Transactions
//!
//! Within `Open`, [`commit`](StorageProvider::commit) durably persists all
//! changes since the last commit/rollback/open and
//! [`rollback`](StorageProvider::rollback) discards them, restoring the last
//! committed snapshot. Both are no-ops, not errors, when nothing is pending.
//!
//! # Identifier allocation
//!
//! The `get_next_*_id` sequences are monotonic per entity and independent of
//! the transaction scope: an id burned by a rolled-back insert is never
//! handed out again.
//!
//! # Copies
//!
//! Getters return owned values, never references into the store, so a caller
//! mutating a returned record cannot corrupt the store behind the
//! transaction's back.

use async_trait::async_trait;

use crate::{account::Account, audit::AuditEntry, error::StorageError, rules::Rules};

#[async_trait]
pub trait StorageProvider: Send {
    /// Open the connection. Fails with [`StorageError::AlreadyOpen`] when
    /// called on an open provider.
    async fn open(&mut self) -> Result<(), StorageError>;

    /// Close the connection, discarding uncommitted changes. Fails with
    /// [`StorageError::Closed`] when called on a closed provider.
    async fn close(&mut self) -> Result<(), StorageError>;

    /// Durably persist all changes since the last commit/rollback/open.
    async fn commit(&mut self) -> Result<(), StorageError>;

    /// Discard all changes since the last commit/rollback/open.
    async fn rollback(&mut self) -> Result<(), StorageError>;

    /// A human-readable description of the backing store.
    async fn get_version(&mut self) -> Result<String, StorageError>;

    /// Allocate the next account id. Monotonic; never reused after rollback.
    async fn get_next_account_id(&mut self) -> Result<i64, StorageError>;

    /// Allocate the next audit entry id. Monotonic; never reused after
    /// rollback.
    async fn get_next_audit_entry_id(&mut self) -> Result<i64, StorageError>;

    async fn get_account_by_username(&mut self, username: &str) -> Result<Account, StorageError>;

    async fn get_account_by_id(&mut self, id: i64) -> Result<Account, StorageError>;

    /// Insert a new account. The account carries its id (allocated via
    /// [`get_next_account_id`](StorageProvider::get_next_account_id));
    /// duplicate ids or usernames fail with [`StorageError::Conflict`].
    async fn add_account(&mut self, account: &Account) -> Result<(), StorageError>;

    /// Replace the stored account with the same id. Fails with
    /// [`StorageError::NotFound`] when no such account exists.
    async fn update_account(&mut self, account: &Account) -> Result<(), StorageError>;

    async fn get_account_count(&mut self) -> Result<i64, StorageError>;

    async fn exists_username(&mut self, username: &str) -> Result<bool, StorageError>;

    /// Append an audit entry. Duplicate ids fail with
    /// [`StorageError::Conflict`]; entries are never updated or deleted.
    async fn add_audit_entry(&mut self, entry: &AuditEntry) -> Result<(), StorageError>;

    async fn get_audit_entry_by_id(&mut self, id: i64) -> Result<AuditEntry, StorageError>;

    /// The entry with the highest id. Fails with [`StorageError::Empty`]
    /// when the log holds no entries at all, which is distinct from the
    /// [`StorageError::NotFound`] of a missing id.
    async fn get_last_audit_entry(&mut self) -> Result<AuditEntry, StorageError>;

    /// The policy record, or the defaults when none has been saved yet.
    async fn get_rules(&mut self) -> Result<Rules, StorageError>;

    async fn save_rules(&mut self, rules: &Rules) -> Result<(), StorageError>;
}
