//! The token-granting surface of the login endpoint.
//!
//! [`TokenIssuer`] runs the login pipeline and, when it succeeds, mints a
//! bearer token. [`TokenResponse`] is the exact wire shape the API returns:
//! `{error_code: 0, message, token, expire_time}` on success,
//! `{error_code: 2, message}` when the pipeline denies the attempt. Token
//! *validation* failures carry codes 1/3/4/5, owned by
//! [`TokenError`](kestrel_core::error::TokenError).

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use kestrel_core::{
    crypto::CredentialHasher,
    error::{Error, TokenError},
    login::LoginToSystem,
    storage::StorageProvider,
    strength::PasswordChecker,
    token::TokenAuthority,
};

/// Error code reported when the login pipeline rejects the credentials.
const LOGIN_REJECTED: u8 = 2;

/// Credentials presented to the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// Wire response of the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TokenResponse {
    Granted {
        error_code: u8,
        message: String,
        token: String,
        expire_time: String,
    },
    Denied {
        error_code: u8,
        message: String,
    },
}

impl TokenResponse {
    pub fn error_code(&self) -> u8 {
        match self {
            TokenResponse::Granted { error_code, .. } => *error_code,
            TokenResponse::Denied { error_code, .. } => *error_code,
        }
    }
}

/// Issues bearer tokens for successful logins.
pub struct TokenIssuer {
    authority: TokenAuthority,
    token_lifetime: Duration,
}

impl TokenIssuer {
    /// Tokens are good for 30 days unless overridden with
    /// [`with_token_lifetime`](TokenIssuer::with_token_lifetime).
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            authority: TokenAuthority::new(secret),
            token_lifetime: Duration::days(30),
        }
    }

    pub fn with_token_lifetime(mut self, token_lifetime: Duration) -> Self {
        self.token_lifetime = token_lifetime;
        self
    }

    /// The authority that validates tokens minted here.
    pub fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Run the login pipeline and mint a token when it succeeds.
    ///
    /// Denials come back as a [`TokenResponse::Denied`] with code 2; an
    /// `Err` means the attempt could not be judged (infrastructure fault).
    pub async fn issue<S, C>(
        &self,
        db: &mut S,
        crypto: &C,
        request: &TokenRequest,
        remote_addr: &str,
        password_checker: Option<&dyn PasswordChecker>,
    ) -> Result<TokenResponse, Error>
    where
        S: StorageProvider,
        C: CredentialHasher,
    {
        let mut login = LoginToSystem::new(db, crypto);
        if let Some(checker) = password_checker {
            login = login.with_password_checker(checker);
        }
        let result = login
            .run(&request.username, &request.password, remote_addr, None)
            .await?;

        if result.has_failed {
            return Ok(TokenResponse::Denied {
                error_code: LOGIN_REJECTED,
                message: result.message,
            });
        }

        let account_id = result.account_id.ok_or_else(|| {
            Error::Token(TokenError::Internal {
                reason: "successful login result carried no account id".to_string(),
            })
        })?;
        let expire_time = Utc::now() + self.token_lifetime;
        let token = self.authority.create_token(account_id, expire_time)?;
        Ok(TokenResponse::Granted {
            error_code: 0,
            message: result.message,
            token,
            expire_time: expire_time.to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_response_serializes_to_two_fields() {
        let response = TokenResponse::Denied {
            error_code: 2,
            message: "Login attempt failed.".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error_code": 2,
                "message": "Login attempt failed."
            })
        );
    }

    #[test]
    fn test_granted_response_serializes_flat() {
        let response = TokenResponse::Granted {
            error_code: 0,
            message: "Login successful.".to_string(),
            token: "abc.def.ghi".to_string(),
            expire_time: "2026-09-04T00:00:00+00:00".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error_code"], 0);
        assert_eq!(json["message"], "Login successful.");
        assert_eq!(json["token"], "abc.def.ghi");
        assert_eq!(json["expire_time"], "2026-09-04T00:00:00+00:00");
    }
}
