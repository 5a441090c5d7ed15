//! Password hashing and verification.
//!
//! Centralizes Argon2 password handling behind a narrow trait so the
//! identity service never touches hash internals and tests can substitute
//! a cheap hasher.

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Password hashing failures. Verification collapses every cause (bad
/// digest encoding, wrong password) into `Mismatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password hashing failed")]
    Hash,
    #[error("password verification failed")]
    Mismatch,
}

/// One-way password hashing contract.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordError>;
    fn verify(&self, digest: &str, password: &str) -> Result<(), PasswordError>;
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2PasswordHasher;

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        Ok(argon2::PasswordHasher::hash_password(&argon2, password.as_bytes(), &salt)
            .map_err(|_| PasswordError::Hash)?
            .to_string())
    }

    fn verify(&self, digest: &str, password: &str) -> Result<(), PasswordError> {
        let parsed = PasswordHash::new(digest).map_err(|_| PasswordError::Mismatch)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| PasswordError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hasher = Argon2PasswordHasher;
        let digest = hasher.hash("hunter2abc1").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(hasher.verify(&digest, "hunter2abc1").is_ok());
        assert_eq!(
            hasher.verify(&digest, "wrong-password"),
            Err(PasswordError::Mismatch)
        );
    }

    #[test]
    fn test_salts_differ() {
        let hasher = Argon2PasswordHasher;
        let a = hasher.hash("same-password1").unwrap();
        let b = hasher.hash("same-password1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_digest_is_mismatch() {
        let hasher = Argon2PasswordHasher;
        assert_eq!(
            hasher.verify("not-a-phc-string", "anything"),
            Err(PasswordError::Mismatch)
        );
    }
}
