//! Password hashing facility (argon2id).
//!
//! Consumed by the registration and login boundaries through the
//! [`PasswordFacility`] trait; verification is constant-time by way of the
//! underlying PHC implementation.

use argon2::password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// External password-hashing/verification collaborator.
pub trait PasswordFacility: Send + Sync {
    fn hash_password(&self, password: &str) -> Result<String, PasswordError>;

    /// Constant-time verification of a password against a stored hash.
    /// An unparsable hash verifies as `false`, never as an error the caller
    /// could distinguish from a wrong password.
    fn verify_password(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id-backed implementation with library-default parameters.
#[derive(Debug, Default)]
pub struct Argon2Facility {
    argon2: Argon2<'static>,
}

impl Argon2Facility {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordFacility for Argon2Facility {
    fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
