//! Minimal always-open storage double for unit tests in this crate.
//!
//! The real adapters live in their own crates and are exercised by the
//! shared behavioral suite; unit tests here only need a store that records
//! what the code under test did to it.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::{
    account::Account, audit::AuditEntry, error::StorageError, rules::Rules,
    storage::StorageProvider,
};

pub struct TestStorage {
    pub accounts: HashMap<i64, Account>,
    pub audit_entries: BTreeMap<i64, AuditEntry>,
    pub rules: Option<Rules>,
    pub commit_count: usize,
    next_account_id: i64,
    next_audit_entry_id: i64,
}

impl TestStorage {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            audit_entries: BTreeMap::new(),
            rules: None,
            commit_count: 0,
            next_account_id: 1,
            next_audit_entry_id: 1,
        }
    }

    pub fn insert_account(&mut self, account: Account) {
        self.next_account_id = self.next_account_id.max(account.id + 1);
        self.accounts.insert(account.id, account);
    }

    pub fn last_audit_entry(&self) -> Option<&AuditEntry> {
        self.audit_entries.values().next_back()
    }
}

#[async_trait]
impl StorageProvider for TestStorage {
    async fn open(&mut self) -> Result<(), StorageError> {
        Err(StorageError::AlreadyOpen)
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        self.commit_count += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_version(&mut self) -> Result<String, StorageError> {
        Ok("TestStorage".to_string())
    }

    async fn get_next_account_id(&mut self) -> Result<i64, StorageError> {
        let id = self.next_account_id;
        self.next_account_id += 1;
        Ok(id)
    }

    async fn get_next_audit_entry_id(&mut self) -> Result<i64, StorageError> {
        let id = self.next_audit_entry_id;
        self.next_audit_entry_id += 1;
        Ok(id)
    }

    async fn get_account_by_username(&mut self, username: &str) -> Result<Account, StorageError> {
        self.accounts
            .values()
            .find(|account| account.username == username)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("account (username={username})")))
    }

    async fn get_account_by_id(&mut self, id: i64) -> Result<Account, StorageError> {
        self.accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("account (id={id})")))
    }

    async fn add_account(&mut self, account: &Account) -> Result<(), StorageError> {
        if self.accounts.contains_key(&account.id) {
            return Err(StorageError::Conflict(format!(
                "account (id={})",
                account.id
            )));
        }
        self.insert_account(account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), StorageError> {
        if !self.accounts.contains_key(&account.id) {
            return Err(StorageError::NotFound(format!("account (id={})", account.id)));
        }
        self.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account_count(&mut self) -> Result<i64, StorageError> {
        Ok(self.accounts.len() as i64)
    }

    async fn exists_username(&mut self, username: &str) -> Result<bool, StorageError> {
        Ok(self
            .accounts
            .values()
            .any(|account| account.username == username))
    }

    async fn add_audit_entry(&mut self, entry: &AuditEntry) -> Result<(), StorageError> {
        if self.audit_entries.contains_key(&entry.id) {
            return Err(StorageError::Conflict(format!(
                "audit entry (id={})",
                entry.id
            )));
        }
        self.audit_entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_audit_entry_by_id(&mut self, id: i64) -> Result<AuditEntry, StorageError> {
        self.audit_entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("audit entry (id={id})")))
    }

    async fn get_last_audit_entry(&mut self) -> Result<AuditEntry, StorageError> {
        self.audit_entries
            .values()
            .next_back()
            .cloned()
            .ok_or(StorageError::Empty)
    }

    async fn get_rules(&mut self) -> Result<Rules, StorageError> {
        Ok(self.rules.clone().unwrap_or_default())
    }

    async fn save_rules(&mut self, rules: &Rules) -> Result<(), StorageError> {
        self.rules = Some(rules.clone());
        Ok(())
    }
}
