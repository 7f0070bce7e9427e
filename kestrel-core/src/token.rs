//! Bearer token issuance and validation.
//!
//! A successful login is turned into a signed, time-limited JWT carrying
//! the account id and an absolute expiry instant. No session state is kept
//! server-side; presenting the token is the whole proof.
//!
//! Validation failures map to the stable API error codes: 1 missing,
//! 3 invalid, 4 expired, 5 internal. Each denial is logged at INFO with the
//! caller's address and the operation being guarded, while the client only
//! ever sees the fixed [`TokenError`] messages.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{account::Account, error::TokenError, storage::StorageProvider};

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    account_id: i64,
    exp: i64,
}

/// Mints and validates bearer tokens with a process-wide secret.
pub struct TokenAuthority {
    secret: Vec<u8>,
}

impl TokenAuthority {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Produce a signed token binding `account_id` until `expire_time`.
    pub fn create_token(
        &self,
        account_id: i64,
        expire_time: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = TokenClaims {
            account_id,
            exp: expire_time.timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|error| TokenError::Internal {
            reason: error.to_string(),
        })
    }

    /// Resolve a presented token back to its account.
    ///
    /// `operation` names the guarded call for the denial log lines. The
    /// `Internal` variant covers both unexpected faults and validly signed
    /// tokens whose account no longer resolves.
    pub async fn authenticate<S>(
        &self,
        token: Option<&str>,
        remote_addr: &str,
        operation: &str,
        db: &mut S,
    ) -> Result<Account, TokenError>
    where
        S: StorageProvider,
    {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => {
                let error = TokenError::Missing;
                info!(
                    "Method access denied from {remote_addr} since no token provided (error_code={}, method={operation}).",
                    error.error_code()
                );
                return Err(error);
            }
        };

        let claims = self.decode_claims(token, remote_addr, operation)?;

        match db.get_account_by_id(claims.account_id).await {
            Ok(account) => Ok(account),
            Err(error) => {
                let reason = error.to_string();
                info!(
                    "Method access denied from {remote_addr} since an unexpected error occurred while processing the token (error_code=5, method={operation}). Reason: {reason}"
                );
                Err(TokenError::Internal { reason })
            }
        }
    }

    fn decode_claims(
        &self,
        token: &str,
        remote_addr: &str,
        operation: &str,
    ) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        match decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        ) {
            Ok(data) => Ok(data.claims),
            Err(error) if matches!(error.kind(), ErrorKind::ExpiredSignature) => {
                let expire_time = self.expire_time_of(token);
                info!(
                    "Method access denied from {remote_addr} since the token has expired (error_code=4, method={operation}, expire_time={expire_time:?})."
                );
                Err(TokenError::Expired { expire_time })
            }
            Err(error) => {
                let reason = error.to_string();
                info!(
                    "Method access denied from {remote_addr} due to an invalid token (error_code=3, method={operation}). Reason: {reason}"
                );
                Err(TokenError::Invalid { reason })
            }
        }
    }

    /// Extract the expiry claim without verifying the signature. Used for
    /// the diagnostic log line on expired tokens; never for authorization.
    pub fn expire_time_of(&self, token: &str) -> Option<DateTime<Utc>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .and_then(|data| DateTime::from_timestamp(data.claims.exp, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::test_support::TestStorage;
    use chrono::Duration;

    const SECRET: &[u8] = b"spooky-test-secret-not-for-production";

    fn store_with_account(id: i64) -> TestStorage {
        let mut db = TestStorage::new();
        db.insert_account(
            Account::builder()
                .id(id)
                .username("fmulder")
                .display_name("Fox Mulder")
                .password_hash("hash")
                .build()
                .unwrap(),
        );
        db
    }

    #[tokio::test]
    async fn test_round_trip_resolves_account() {
        let authority = TokenAuthority::new(SECRET);
        let mut db = store_with_account(7);
        let token = authority
            .create_token(7, Utc::now() + Duration::hours(1))
            .unwrap();

        let account = authority
            .authenticate(Some(&token), "10.0.0.1", "verify_token", &mut db)
            .await
            .unwrap();
        assert_eq!(account.id, 7);
        assert_eq!(account.username, "fmulder");
    }

    #[tokio::test]
    async fn test_missing_token_is_code_1() {
        let authority = TokenAuthority::new(SECRET);
        let mut db = TestStorage::new();

        for presented in [None, Some("")] {
            let error = authority
                .authenticate(presented, "10.0.0.1", "verify_token", &mut db)
                .await
                .unwrap_err();
            assert_eq!(error.error_code(), 1);
            assert_eq!(error.to_string(), "An authorization token is required.");
        }
    }

    #[tokio::test]
    async fn test_foreign_signature_is_code_3() {
        let authority = TokenAuthority::new(SECRET);
        let foreign = TokenAuthority::new(b"some-other-secret".to_vec());
        let mut db = store_with_account(7);
        let token = foreign
            .create_token(7, Utc::now() + Duration::hours(1))
            .unwrap();

        let error = authority
            .authenticate(Some(&token), "10.0.0.1", "verify_token", &mut db)
            .await
            .unwrap_err();
        assert_eq!(error.error_code(), 3);
        assert_eq!(
            error.to_string(),
            "The provided authorization token is invalid."
        );
    }

    #[tokio::test]
    async fn test_garbage_token_is_code_3() {
        let authority = TokenAuthority::new(SECRET);
        let mut db = store_with_account(7);

        let error = authority
            .authenticate(Some("not.a.token"), "10.0.0.1", "verify_token", &mut db)
            .await
            .unwrap_err();
        assert_eq!(error.error_code(), 3);
    }

    #[tokio::test]
    async fn test_expired_token_is_code_4_with_extractable_expiry() {
        let authority = TokenAuthority::new(SECRET);
        let mut db = store_with_account(7);
        let expire_time = Utc::now() - Duration::minutes(5);
        let token = authority.create_token(7, expire_time).unwrap();

        let error = authority
            .authenticate(Some(&token), "10.0.0.1", "verify_token", &mut db)
            .await
            .unwrap_err();
        assert_eq!(error.error_code(), 4);
        assert_eq!(
            error.to_string(),
            "The authorization token has expired."
        );
        match error {
            TokenError::Expired { expire_time: found } => {
                assert_eq!(found.unwrap().timestamp(), expire_time.timestamp());
            }
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unresolvable_account_is_code_5() {
        let authority = TokenAuthority::new(SECRET);
        let mut db = TestStorage::new(); // account 7 never existed here
        let token = authority
            .create_token(7, Utc::now() + Duration::hours(1))
            .unwrap();

        let error = authority
            .authenticate(Some(&token), "10.0.0.1", "verify_token", &mut db)
            .await
            .unwrap_err();
        assert_eq!(error.error_code(), 5);
        assert_eq!(
            error.to_string(),
            "An unexpected error occurred when processing the authorization token."
        );
    }

    #[test]
    fn test_expire_time_survives_signature_check_bypass() {
        let authority = TokenAuthority::new(SECRET);
        let expire_time = Utc::now() + Duration::days(30);
        let token = authority.create_token(7, expire_time).unwrap();

        // readable even by an authority holding a different secret
        let other = TokenAuthority::new(b"different".to_vec());
        let found = other.expire_time_of(&token).unwrap();
        assert_eq!(found.timestamp(), expire_time.timestamp());

        assert!(other.expire_time_of("garbage").is_none());
    }
}
