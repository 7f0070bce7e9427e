//! Lockout policy configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_LOGIN_FAIL_THRESHOLD_COUNT: i64 = 3;
pub const DEFAULT_LOGIN_FAIL_LOCK_MINUTES: i64 = 15;

/// Policy values governing lockout behavior.
///
/// A singleton record per store, read on every login attempt. When the store
/// holds no record yet the defaults apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    /// Consecutive password failures allowed before the account locks.
    pub login_fail_threshold_count: i64,
    /// How long a lock lasts.
    pub login_fail_lock_minutes: i64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            login_fail_threshold_count: DEFAULT_LOGIN_FAIL_THRESHOLD_COUNT,
            login_fail_lock_minutes: DEFAULT_LOGIN_FAIL_LOCK_MINUTES,
        }
    }
}

impl Rules {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.login_fail_threshold_count < 1 {
            return Err(ValidationError::InvalidId(
                "login_fail_threshold_count must be a positive integer".to_string(),
            ));
        }
        if self.login_fail_lock_minutes < 1 {
            return Err(ValidationError::InvalidId(
                "login_fail_lock_minutes must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}
