//! Password hashing strategies.
//!
//! The login pipeline treats hashing as an opaque capability: one-way hash
//! plus verification of a candidate against a stored hash. Implementations
//! are interchangeable; the stored hash format is owned entirely by the
//! hasher that produced it.

use crate::error::CryptoError;

pub trait CredentialHasher: Send + Sync {
    /// Produce a one-way hash of `plain`.
    fn hash(&self, plain: &str) -> Result<String, CryptoError>;

    /// Whether `plain` matches the stored `hash`.
    fn verify(&self, hash: &str, plain: &str) -> bool;
}

/// Production hasher backed by argon2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String, CryptoError> {
        Ok(password_auth::generate_hash(plain))
    }

    fn verify(&self, hash: &str, plain: &str) -> bool {
        password_auth::verify_password(plain, hash).is_ok()
    }
}

/// Deliberately transparent hasher for tests: the "hash" is the input with
/// the case of every letter swapped. Worthless as protection, but it makes
/// stored values easy to assert on.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwapcaseHasher;

impl SwapcaseHasher {
    fn swapcase(text: &str) -> String {
        text.chars()
            .map(|c| {
                if c.is_uppercase() {
                    c.to_ascii_lowercase()
                } else if c.is_lowercase() {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    }
}

impl CredentialHasher for SwapcaseHasher {
    fn hash(&self, plain: &str) -> Result<String, CryptoError> {
        Ok(Self::swapcase(plain))
    }

    fn verify(&self, hash: &str, plain: &str) -> bool {
        hash == Self::swapcase(plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapcase_round_trip() {
        let hasher = SwapcaseHasher;
        let hash = hasher.hash("TrustNo1").unwrap();
        assert_eq!(hash, "tRUSTnO1");
        assert!(hasher.verify(&hash, "TrustNo1"));
        assert!(!hasher.verify(&hash, "trustno1"));
    }

    #[test]
    fn test_argon2_verifies_own_hash() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("TrustNo1").unwrap();
        assert_ne!(hash, "TrustNo1");
        assert!(hasher.verify(&hash, "TrustNo1"));
        assert!(!hasher.verify(&hash, "TrustNo2"));
    }

    #[test]
    fn test_argon2_rejects_garbage_hash() {
        let hasher = Argon2Hasher;
        assert!(!hasher.verify("not-a-real-hash", "TrustNo1"));
    }
}
