//! One-way credential hashing and verification (Argon2id).
//!
//! Cost parameters are fixed here rather than exposed to callers:
//! memory = 19 MiB, iterations = 2, lanes = 1. Raising them makes offline
//! attacks slower and every login slower by the same factor.

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error;

use crate::identity::CredentialHash;

/// Memory cost in KiB.
pub const MEMORY_COST_KIB: u32 = 19 * 1024;
/// Number of passes over memory.
pub const TIME_COST: u32 = 2;
/// Degree of parallelism.
pub const PARALLELISM: u32 = 1;

const SALT_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("failed to generate salt: {0}")]
    Salt(String),

    #[error("failed to hash credential: {0}")]
    Hash(String),
}

/// Hashes and verifies passwords.
///
/// Hashing is deliberately slow and CPU-bound; async callers should run it on
/// the blocking pool and must not hold any shared lock while it runs.
#[derive(Clone)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
}

impl CredentialVerifier {
    pub fn new() -> Self {
        let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
            .unwrap_or_default();
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hash a plaintext password with a fresh random salt embedded in the output.
    pub fn hash(&self, plaintext: &str) -> Result<CredentialHash, CredentialError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| CredentialError::Salt(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| CredentialError::Salt(e.to_string()))?;

        let phc = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?
            .to_string();

        Ok(CredentialHash::from_stored(phc))
    }

    /// Verify a plaintext password against a stored hash.
    ///
    /// The final digest comparison is constant-time. A malformed hash yields
    /// `false`, never an error.
    pub fn verify(&self, plaintext: &str, hash: &CredentialHash) -> bool {
        match PasswordHash::new(hash.as_str()) {
            Ok(parsed) => self.argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}
