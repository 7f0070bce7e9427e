//! The login verification pipeline.
//!
//! [`LoginToSystem`] runs a login attempt through a fixed sequence of
//! checks: existence, dormancy, lock, password correctness, forced password
//! change, and (when a replacement password is supplied) distinctness and
//! strength. Each check may short-circuit, recording exactly one audit
//! entry before the attempt is denied.
//!
//! Existence, dormancy, and lock are checked before the password so that a
//! dormant or locked account never reveals whether the supplied password
//! was correct, while a wrong-password attempt is only recorded when the
//! account was genuinely reachable.
//!
//! Denials are ordinary [`LoginResult`] values; only infrastructure faults
//! (storage, hashing) surface as errors from [`run`](LoginToSystem::run).

use chrono::{Duration, Utc};
use tracing::info;

use crate::{
    account::Account,
    audit::{AuditEntry, AuditTag},
    crypto::CredentialHasher,
    error::{CryptoError, Error, StorageError},
    storage::StorageProvider,
    strength::PasswordChecker,
};

/// Outcome of a login attempt. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub message: String,
    pub has_failed: bool,
    pub must_change_password: bool,
    /// Present only when the attempt succeeded.
    pub account_id: Option<i64>,
}

/// Internal control flow of the pipeline: a stage either denies the attempt
/// or hits an infrastructure fault. Stages short-circuit with `?`.
enum LoginFlow {
    Denied {
        message: String,
        must_change_password: bool,
    },
    Fault(Error),
}

impl LoginFlow {
    fn denied(message: impl Into<String>) -> Self {
        LoginFlow::Denied {
            message: message.into(),
            must_change_password: false,
        }
    }
}

impl From<Error> for LoginFlow {
    fn from(error: Error) -> Self {
        LoginFlow::Fault(error)
    }
}

impl From<StorageError> for LoginFlow {
    fn from(error: StorageError) -> Self {
        LoginFlow::Fault(Error::Storage(error))
    }
}

impl From<CryptoError> for LoginFlow {
    fn from(error: CryptoError) -> Self {
        LoginFlow::Fault(Error::Crypto(error))
    }
}

/// One login attempt's worth of orchestration over a storage connection and
/// a credential hasher. Construct one per request.
pub struct LoginToSystem<'a, S, C>
where
    S: StorageProvider,
    C: CredentialHasher + ?Sized,
{
    db: &'a mut S,
    crypto: &'a C,
    password_checker: Option<&'a dyn PasswordChecker>,
}

impl<'a, S, C> LoginToSystem<'a, S, C>
where
    S: StorageProvider,
    C: CredentialHasher + ?Sized,
{
    pub fn new(db: &'a mut S, crypto: &'a C) -> Self {
        Self {
            db,
            crypto,
            password_checker: None,
        }
    }

    /// Gate replacement passwords through a strength checker.
    pub fn with_password_checker(mut self, checker: &'a dyn PasswordChecker) -> Self {
        self.password_checker = Some(checker);
        self
    }

    /// Run the verification pipeline for one attempt.
    ///
    /// Denials come back as a failed [`LoginResult`]; an `Err` means the
    /// attempt could not be judged at all (storage or hashing fault).
    pub async fn run(
        &mut self,
        username: &str,
        password: &str,
        client_address: &str,
        new_password: Option<&str>,
    ) -> Result<LoginResult, Error> {
        match self
            .attempt(username, password, client_address, new_password)
            .await
        {
            Ok(result) => Ok(result),
            Err(LoginFlow::Denied {
                message,
                must_change_password,
            }) => Ok(LoginResult {
                message,
                has_failed: true,
                must_change_password,
                account_id: None,
            }),
            Err(LoginFlow::Fault(error)) => Err(error),
        }
    }

    async fn attempt(
        &mut self,
        username: &str,
        password: &str,
        client_address: &str,
        new_password: Option<&str>,
    ) -> Result<LoginResult, LoginFlow> {
        self.verify_account_exists(username, client_address).await?;
        let mut account = self.db.get_account_by_username(username).await?;
        self.verify_account_active(&account, client_address).await?;
        self.verify_account_unlocked(&account, client_address)
            .await?;
        self.verify_password_correct(&mut account, password, client_address)
            .await?;
        self.verify_password_reset_satisfied(&account, new_password, client_address)
            .await?;
        if let Some(new_password) = new_password {
            self.verify_new_password_is_different(&account, password, new_password, client_address)
                .await?;
            self.verify_new_password_is_fit(&account, new_password, client_address)
                .await?;
        }
        self.conclude(account, client_address, new_password).await
    }

    async fn verify_account_exists(
        &mut self,
        username: &str,
        client_address: &str,
    ) -> Result<(), LoginFlow> {
        if self.db.exists_username(username).await? {
            return Ok(());
        }
        let text = format!(
            "Unknown account (username={username}) from {client_address} attempted to login."
        );
        self.record_audit_entry(None, AuditTag::UnknownUser, text)
            .await?;
        Err(LoginFlow::denied("Login attempt failed."))
    }

    async fn verify_account_active(
        &mut self,
        account: &Account,
        client_address: &str,
    ) -> Result<(), LoginFlow> {
        if !account.is_dormant {
            return Ok(());
        }
        let text = format!(
            "Dormant account (username={}) from {client_address} attempted to login.",
            account.username
        );
        self.record_audit_entry(Some(account.id), AuditTag::DormantUser, text)
            .await?;
        Err(LoginFlow::denied(
            "Login attempt failed. Your credentials are invalid.",
        ))
    }

    async fn verify_account_unlocked(
        &mut self,
        account: &Account,
        client_address: &str,
    ) -> Result<(), LoginFlow> {
        if !self.lock_is_active(account).await? {
            return Ok(());
        }
        let text = format!(
            "Locked account (username={}) from {client_address} attempted to login.",
            account.username
        );
        self.record_audit_entry(Some(account.id), AuditTag::LockedUser, text)
            .await?;
        Err(LoginFlow::denied(
            "Login attempt failed. Your account is locked.",
        ))
    }

    /// A lock is active until its expiry passes; after that the account is
    /// treated as unlocked without any background sweep clearing the flag.
    async fn lock_is_active(&mut self, account: &Account) -> Result<bool, Error> {
        if !account.is_locked {
            return Ok(false);
        }
        let last_failure = match account.last_password_failure_time {
            Some(time) => time,
            None => return Ok(false),
        };
        let rules = self.db.get_rules().await?;
        let expire_time = last_failure + Duration::minutes(rules.login_fail_lock_minutes);
        Ok(Utc::now() < expire_time)
    }

    async fn verify_password_correct(
        &mut self,
        account: &mut Account,
        password: &str,
        client_address: &str,
    ) -> Result<(), LoginFlow> {
        if self.crypto.verify(&account.password_hash, password) {
            return Ok(());
        }
        account.ongoing_password_failure_count += 1;
        let rules = self.db.get_rules().await?;
        if account.ongoing_password_failure_count > rules.login_fail_threshold_count {
            account.is_locked = true;
        }
        account.last_password_failure_time = Some(Utc::now());
        self.db.update_account(account).await?;
        let text = format!(
            "Account (username={}) from {client_address} attempted to login with the wrong password (ongoing_password_failure_count={}).",
            account.username, account.ongoing_password_failure_count
        );
        self.record_audit_entry(Some(account.id), AuditTag::WrongPassword, text)
            .await?;
        Err(LoginFlow::denied("Login attempt failed."))
    }

    async fn verify_password_reset_satisfied(
        &mut self,
        account: &Account,
        new_password: Option<&str>,
        client_address: &str,
    ) -> Result<(), LoginFlow> {
        if !account.needs_password_change || new_password.is_some() {
            return Ok(());
        }
        let text = format!(
            "Account (username={}) with password marked for reset from {client_address} attempted to login without providing a new password.",
            account.username
        );
        self.record_audit_entry(Some(account.id), AuditTag::MustChangePassword, text)
            .await?;
        Err(LoginFlow::Denied {
            message: "Password marked for reset. Must supply a new password.".to_string(),
            must_change_password: true,
        })
    }

    async fn verify_new_password_is_different(
        &mut self,
        account: &Account,
        password: &str,
        new_password: &str,
        client_address: &str,
    ) -> Result<(), LoginFlow> {
        if new_password != password {
            return Ok(());
        }
        let text = format!(
            "Account (username={}) from {client_address} attempted to login with a password change but the new password was the same as the current one.",
            account.username
        );
        self.record_audit_entry(Some(account.id), AuditTag::UnfitPassword, text)
            .await?;
        Err(LoginFlow::denied(
            "Password change failed. New password can not be the same as the current one.",
        ))
    }

    async fn verify_new_password_is_fit(
        &mut self,
        account: &Account,
        new_password: &str,
        client_address: &str,
    ) -> Result<(), LoginFlow> {
        let checker = match self.password_checker {
            Some(checker) => checker,
            None => return Ok(()),
        };
        let strength = checker.check(new_password);
        if !strength.is_too_low {
            return Ok(());
        }
        let text = format!(
            "Account (username={}) from {client_address} attempted to login with a password change but the new password was too weak.",
            account.username
        );
        self.record_audit_entry(Some(account.id), AuditTag::UnfitPassword, text)
            .await?;
        let mut message = String::from("Password change failed. New password is too weak.");
        for suggestion in &strength.suggestions {
            message.push(' ');
            message.push_str(suggestion);
        }
        Err(LoginFlow::denied(message))
    }

    async fn conclude(
        &mut self,
        mut account: Account,
        client_address: &str,
        new_password: Option<&str>,
    ) -> Result<LoginResult, LoginFlow> {
        let mut message = String::from("Login successful.");
        let mut text = format!(
            "Account (username={}) from {client_address} successfully logged in.",
            account.username
        );
        if let Some(new_password) = new_password {
            account.password_hash = self.crypto.hash(new_password)?;
            account.needs_password_change = false;
            message.push_str(" Password successfully changed.");
            text.push_str(" Password successfully changed.");
        }
        account.is_locked = false;
        account.ongoing_password_failure_count = 0;
        self.db.update_account(&account).await?;
        self.record_audit_entry(Some(account.id), AuditTag::UserLogin, text)
            .await?;
        Ok(LoginResult {
            message,
            has_failed: false,
            must_change_password: false,
            account_id: Some(account.id),
        })
    }

    /// Write one audit entry, echo it to the log, and commit. Each entry
    /// commits together with whatever account mutation its stage made.
    async fn record_audit_entry(
        &mut self,
        account_id: Option<i64>,
        tag: AuditTag,
        text: String,
    ) -> Result<(), Error> {
        let id = self.db.get_next_audit_entry_id().await?;
        let entry = AuditEntry::builder()
            .id(id)
            .time(Utc::now())
            .account_id(account_id)
            .tag(tag)
            .text(text)
            .build()?;
        self.db.add_audit_entry(&entry).await?;
        info!("{}", entry.text);
        self.db.commit().await?;
        Ok(())
    }
}
