//! In-memory storage backend.
//!
//! [`MemoryStorage`] satisfies the full [`StorageProvider`] contract by
//! snapshotting every table on `open`/`commit` and restoring the snapshot
//! on `rollback`/`close` — no write-ahead log, just deep copies. Rollback
//! therefore restores the last committed state, not an arbitrary earlier
//! point. Sequence counters live outside the snapshot so ids burned by a
//! rolled-back insert are never reused.
//!
//! Intended for tests and examples; data lives only as long as the value.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use kestrel_core::{
    account::Account, audit::AuditEntry, error::StorageError, rules::Rules,
    storage::StorageProvider,
};

const VERSION: &str = "MemoryStore 1.0 - a lightweight in-memory store for unit testing";

#[derive(Debug, Default, Clone)]
struct Tables {
    accounts: HashMap<i64, Account>,
    audit_entries: BTreeMap<i64, AuditEntry>,
    rules: Option<Rules>,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    is_open: bool,
    tables: Tables,
    saved: Tables,
    next_account_id: i64,
    next_audit_entry_id: i64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            is_open: false,
            tables: Tables::default(),
            saved: Tables::default(),
            next_account_id: 1,
            next_audit_entry_id: 1,
        }
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.is_open {
            Ok(())
        } else {
            Err(StorageError::Closed)
        }
    }

    fn save_tables(&mut self) {
        self.saved = self.tables.clone();
    }

    fn restore_tables(&mut self) {
        self.tables = self.saved.clone();
    }

    fn account_id_for_username(&self, username: &str) -> Option<i64> {
        self.tables
            .accounts
            .values()
            .find(|account| account.username == username)
            .map(|account| account.id)
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn open(&mut self) -> Result<(), StorageError> {
        if self.is_open {
            return Err(StorageError::AlreadyOpen);
        }
        self.is_open = true;
        self.save_tables();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.restore_tables();
        self.is_open = false;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.save_tables();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.restore_tables();
        Ok(())
    }

    async fn get_version(&mut self) -> Result<String, StorageError> {
        self.ensure_open()?;
        Ok(VERSION.to_string())
    }

    async fn get_next_account_id(&mut self) -> Result<i64, StorageError> {
        self.ensure_open()?;
        let id = self.next_account_id;
        self.next_account_id += 1;
        Ok(id)
    }

    async fn get_next_audit_entry_id(&mut self) -> Result<i64, StorageError> {
        self.ensure_open()?;
        let id = self.next_audit_entry_id;
        self.next_audit_entry_id += 1;
        Ok(id)
    }

    async fn get_account_by_username(&mut self, username: &str) -> Result<Account, StorageError> {
        self.ensure_open()?;
        let id = self
            .account_id_for_username(username)
            .ok_or_else(|| StorageError::NotFound(format!("account (username={username})")))?;
        Ok(self.tables.accounts[&id].clone())
    }

    async fn get_account_by_id(&mut self, id: i64) -> Result<Account, StorageError> {
        self.ensure_open()?;
        self.tables
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("account (id={id})")))
    }

    async fn add_account(&mut self, account: &Account) -> Result<(), StorageError> {
        self.ensure_open()?;
        if self.account_id_for_username(&account.username).is_some() {
            return Err(StorageError::Conflict(format!(
                "account (username={})",
                account.username
            )));
        }
        if self.tables.accounts.contains_key(&account.id) {
            return Err(StorageError::Conflict(format!("account (id={})", account.id)));
        }
        self.tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), StorageError> {
        self.ensure_open()?;
        if !self.tables.accounts.contains_key(&account.id) {
            return Err(StorageError::NotFound(format!("account (id={})", account.id)));
        }
        self.tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account_count(&mut self) -> Result<i64, StorageError> {
        self.ensure_open()?;
        Ok(self.tables.accounts.len() as i64)
    }

    async fn exists_username(&mut self, username: &str) -> Result<bool, StorageError> {
        self.ensure_open()?;
        Ok(self.account_id_for_username(username).is_some())
    }

    async fn add_audit_entry(&mut self, entry: &AuditEntry) -> Result<(), StorageError> {
        self.ensure_open()?;
        if self.tables.audit_entries.contains_key(&entry.id) {
            return Err(StorageError::Conflict(format!(
                "audit entry (id={})",
                entry.id
            )));
        }
        self.tables.audit_entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_audit_entry_by_id(&mut self, id: i64) -> Result<AuditEntry, StorageError> {
        self.ensure_open()?;
        self.tables
            .audit_entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("audit entry (id={id})")))
    }

    async fn get_last_audit_entry(&mut self) -> Result<AuditEntry, StorageError> {
        self.ensure_open()?;
        self.tables
            .audit_entries
            .values()
            .next_back()
            .cloned()
            .ok_or(StorageError::Empty)
    }

    async fn get_rules(&mut self) -> Result<Rules, StorageError> {
        self.ensure_open()?;
        Ok(self.tables.rules.clone().unwrap_or_default())
    }

    async fn save_rules(&mut self, rules: &Rules) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.tables.rules = Some(rules.clone());
        Ok(())
    }
}
