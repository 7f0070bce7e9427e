//! SQLite storage backend.
//!
//! [`SqliteStorage`] holds one `sqlx::SqliteConnection` for the lifetime of
//! the `Open` state and brackets it with explicit `BEGIN`/`COMMIT`/
//! `ROLLBACK` statements, so the connection is always inside a transaction
//! while open and `commit`/`rollback` behave exactly like the contract
//! demands.
//!
//! SQLite has no server-side sequences, and allocating ids through the
//! transactional connection would let a rollback un-burn them. Id sequences
//! therefore come from a process-wide registry keyed by database URL,
//! seeded from `max(id) + 1` the first time a store on that URL opens.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use tracing::debug;

use kestrel_core::{
    account::Account,
    audit::{AuditEntry, AuditTag},
    error::StorageError,
    rules::Rules,
    storage::StorageProvider,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS account (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    needs_password_change INTEGER NOT NULL DEFAULT 0,
    is_locked INTEGER NOT NULL DEFAULT 0,
    is_dormant INTEGER NOT NULL DEFAULT 0,
    ongoing_password_failure_count INTEGER NOT NULL DEFAULT 0,
    last_password_failure_time TEXT
);

CREATE TABLE IF NOT EXISTS audit_entry (
    id INTEGER PRIMARY KEY,
    time TEXT NOT NULL,
    account_id INTEGER,
    tag TEXT NOT NULL,
    text TEXT NOT NULL,
    usecase_tag TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rule (
    tag TEXT PRIMARY KEY,
    tag_value TEXT NOT NULL
);
"#;

#[derive(Debug, Clone, Copy)]
struct Sequences {
    next_account_id: i64,
    next_audit_entry_id: i64,
}

#[derive(Debug, Clone, Copy)]
enum Sequence {
    Account,
    AuditEntry,
}

fn sequence_registry() -> &'static Mutex<HashMap<String, Sequences>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Sequences>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    username: String,
    display_name: String,
    password_hash: String,
    needs_password_change: bool,
    is_locked: bool,
    is_dormant: bool,
    ongoing_password_failure_count: i64,
    last_password_failure_time: Option<DateTime<Utc>>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            password_hash: row.password_hash,
            needs_password_change: row.needs_password_change,
            is_locked: row.is_locked,
            is_dormant: row.is_dormant,
            ongoing_password_failure_count: row.ongoing_password_failure_count,
            last_password_failure_time: row.last_password_failure_time,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuditEntryRow {
    id: i64,
    time: DateTime<Utc>,
    account_id: Option<i64>,
    tag: String,
    text: String,
    usecase_tag: String,
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = StorageError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        let tag = AuditTag::from_str(&row.tag)
            .map_err(|error| StorageError::Database(error.to_string()))?;
        Ok(AuditEntry {
            id: row.id,
            time: row.time,
            account_id: row.account_id,
            tag,
            text: row.text,
            usecase_tag: row.usecase_tag,
        })
    }
}

pub struct SqliteStorage {
    url: String,
    conn: Option<SqliteConnection>,
}

impl SqliteStorage {
    /// Create a closed store for the given database URL, e.g.
    /// `sqlite:/var/lib/kestrel/kestrel.db`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: None,
        }
    }

    /// Install the schema. The store must be open; the schema statements
    /// are committed immediately.
    pub async fn migrate(&mut self) -> Result<(), StorageError> {
        let conn = self.conn_mut()?;
        sqlx::raw_sql(SCHEMA)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        debug!("installed sqlite schema");
        self.commit().await
    }

    fn conn_mut(&mut self) -> Result<&mut SqliteConnection, StorageError> {
        self.conn.as_mut().ok_or(StorageError::Closed)
    }

    async fn execute_statement(&mut self, sql: &str) -> Result<(), StorageError> {
        let conn = self.conn_mut()?;
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn seed_sequences(conn: &mut SqliteConnection, url: &str) -> Result<(), StorageError> {
        {
            let registry = sequence_registry()
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if registry.contains_key(url) {
                return Ok(());
            }
        }
        // A fresh database has no tables until migrate() runs; treat the
        // failed max(id) lookup the same as an empty table.
        let next_account_id = max_id(conn, "SELECT max(id) FROM account").await + 1;
        let next_audit_entry_id = max_id(conn, "SELECT max(id) FROM audit_entry").await + 1;
        let mut registry = sequence_registry()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registry.entry(url.to_string()).or_insert(Sequences {
            next_account_id,
            next_audit_entry_id,
        });
        Ok(())
    }

    fn allocate_id(&mut self, sequence: Sequence) -> Result<i64, StorageError> {
        self.conn_mut()?;
        let mut registry = sequence_registry()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sequences = registry.entry(self.url.clone()).or_insert(Sequences {
            next_account_id: 1,
            next_audit_entry_id: 1,
        });
        let slot = match sequence {
            Sequence::Account => &mut sequences.next_account_id,
            Sequence::AuditEntry => &mut sequences.next_audit_entry_id,
        };
        let id = *slot;
        *slot += 1;
        Ok(id)
    }
}

async fn max_id(conn: &mut SqliteConnection, sql: &str) -> i64 {
    sqlx::query_scalar::<_, Option<i64>>(sql)
        .fetch_one(&mut *conn)
        .await
        .ok()
        .flatten()
        .unwrap_or(0)
}

fn db_error(error: sqlx::Error) -> StorageError {
    StorageError::Database(error.to_string())
}

fn insert_error(error: sqlx::Error, key: String) -> StorageError {
    if error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        StorageError::Conflict(key)
    } else {
        db_error(error)
    }
}

#[async_trait]
impl StorageProvider for SqliteStorage {
    async fn open(&mut self) -> Result<(), StorageError> {
        if self.conn.is_some() {
            return Err(StorageError::AlreadyOpen);
        }
        let options = SqliteConnectOptions::from_str(&self.url)
            .map_err(db_error)?
            .create_if_missing(true);
        let mut conn = options.connect().await.map_err(db_error)?;
        Self::seed_sequences(&mut conn, &self.url).await?;
        sqlx::query("BEGIN")
            .execute(&mut conn)
            .await
            .map_err(db_error)?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        let conn = self.conn.take().ok_or(StorageError::Closed)?;
        // Closing the connection discards the open transaction, and with
        // it any uncommitted changes.
        conn.close().await.map_err(db_error)?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        self.execute_statement("COMMIT").await?;
        self.execute_statement("BEGIN").await
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        self.execute_statement("ROLLBACK").await?;
        self.execute_statement("BEGIN").await
    }

    async fn get_version(&mut self) -> Result<String, StorageError> {
        let conn = self.conn_mut()?;
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error)?;
        Ok(format!("SQLite version {version}"))
    }

    async fn get_next_account_id(&mut self) -> Result<i64, StorageError> {
        self.allocate_id(Sequence::Account)
    }

    async fn get_next_audit_entry_id(&mut self) -> Result<i64, StorageError> {
        self.allocate_id(Sequence::AuditEntry)
    }

    async fn get_account_by_username(&mut self, username: &str) -> Result<Account, StorageError> {
        let conn = self.conn_mut()?;
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM account WHERE username = ?1")
            .bind(username)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StorageError::NotFound(format!("account (username={username})")))?;
        Ok(row.into())
    }

    async fn get_account_by_id(&mut self, id: i64) -> Result<Account, StorageError> {
        let conn = self.conn_mut()?;
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM account WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StorageError::NotFound(format!("account (id={id})")))?;
        Ok(row.into())
    }

    async fn add_account(&mut self, account: &Account) -> Result<(), StorageError> {
        let conn = self.conn_mut()?;
        sqlx::query(
            r#"
            INSERT INTO account (id, username, display_name, password_hash,
                needs_password_change, is_locked, is_dormant,
                ongoing_password_failure_count, last_password_failure_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(&account.password_hash)
        .bind(account.needs_password_change)
        .bind(account.is_locked)
        .bind(account.is_dormant)
        .bind(account.ongoing_password_failure_count)
        .bind(account.last_password_failure_time)
        .execute(&mut *conn)
        .await
        .map_err(|error| {
            insert_error(
                error,
                format!("account (id={}, username={})", account.id, account.username),
            )
        })?;
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), StorageError> {
        let conn = self.conn_mut()?;
        let result = sqlx::query(
            r#"
            UPDATE account
            SET username = ?2,
                display_name = ?3,
                password_hash = ?4,
                needs_password_change = ?5,
                is_locked = ?6,
                is_dormant = ?7,
                ongoing_password_failure_count = ?8,
                last_password_failure_time = ?9
            WHERE id = ?1
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(&account.password_hash)
        .bind(account.needs_password_change)
        .bind(account.is_locked)
        .bind(account.is_dormant)
        .bind(account.ongoing_password_failure_count)
        .bind(account.last_password_failure_time)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("account (id={})", account.id)));
        }
        Ok(())
    }

    async fn get_account_count(&mut self) -> Result<i64, StorageError> {
        let conn = self.conn_mut()?;
        sqlx::query_scalar("SELECT count(*) FROM account")
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error)
    }

    async fn exists_username(&mut self, username: &str) -> Result<bool, StorageError> {
        let conn = self.conn_mut()?;
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM account WHERE username = ?1")
            .bind(username)
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error)?;
        Ok(count > 0)
    }

    async fn add_audit_entry(&mut self, entry: &AuditEntry) -> Result<(), StorageError> {
        let conn = self.conn_mut()?;
        sqlx::query(
            r#"
            INSERT INTO audit_entry (id, time, account_id, tag, text, usecase_tag)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.time)
        .bind(entry.account_id)
        .bind(entry.tag.as_str())
        .bind(&entry.text)
        .bind(&entry.usecase_tag)
        .execute(&mut *conn)
        .await
        .map_err(|error| insert_error(error, format!("audit entry (id={})", entry.id)))?;
        Ok(())
    }

    async fn get_audit_entry_by_id(&mut self, id: i64) -> Result<AuditEntry, StorageError> {
        let conn = self.conn_mut()?;
        let row = sqlx::query_as::<_, AuditEntryRow>("SELECT * FROM audit_entry WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StorageError::NotFound(format!("audit entry (id={id})")))?;
        row.try_into()
    }

    async fn get_last_audit_entry(&mut self) -> Result<AuditEntry, StorageError> {
        let conn = self.conn_mut()?;
        let row =
            sqlx::query_as::<_, AuditEntryRow>("SELECT * FROM audit_entry ORDER BY id DESC LIMIT 1")
                .fetch_optional(&mut *conn)
                .await
                .map_err(db_error)?
                .ok_or(StorageError::Empty)?;
        row.try_into()
    }

    async fn get_rules(&mut self) -> Result<Rules, StorageError> {
        let conn = self.conn_mut()?;
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT tag, tag_value FROM rule")
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;
        let mut rules = Rules::default();
        for (tag, tag_value) in rows {
            let value: i64 = tag_value.parse().map_err(|_| {
                StorageError::Database(format!("rule {tag} has non-integer value {tag_value}"))
            })?;
            match tag.as_str() {
                "login_fail_threshold_count" => rules.login_fail_threshold_count = value,
                "login_fail_lock_minutes" => rules.login_fail_lock_minutes = value,
                _ => {}
            }
        }
        Ok(rules)
    }

    async fn save_rules(&mut self, rules: &Rules) -> Result<(), StorageError> {
        self.execute_statement("DELETE FROM rule").await?;
        let values = [
            (
                "login_fail_threshold_count",
                rules.login_fail_threshold_count,
            ),
            ("login_fail_lock_minutes", rules.login_fail_lock_minutes),
        ];
        let conn = self.conn_mut()?;
        for (tag, value) in values {
            sqlx::query("INSERT INTO rule (tag, tag_value) VALUES (?1, ?2)")
                .bind(tag)
                .bind(value.to_string())
                .execute(&mut *conn)
                .await
                .map_err(db_error)?;
        }
        Ok(())
    }
}
