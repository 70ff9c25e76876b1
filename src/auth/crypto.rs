//! # Cryptographic Utilities
//!
//! Passwords are only ever stored as Argon2id PHC strings, and tokens only as
//! SHA-256 digests. Secret comparisons go through constant-time equality.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as PhcHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::errors::{AuthError, AuthResult};

/// Random bytes behind every session and reset token
const TOKEN_BYTES: usize = 32;

/// Rules a new password must satisfy
///
/// The default policy accepts any password; deployments opt into rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_number: bool,
    pub require_special: bool,
}

impl PasswordPolicy {
    /// Check a candidate password, reporting the first rule it breaks
    pub fn validate(&self, password: &str) -> AuthResult<()> {
        if password.chars().count() < self.min_length {
            return Err(AuthError::WeakPassword(format!(
                "password must be at least {} characters",
                self.min_length
            )));
        }

        let rules: [(bool, fn(char) -> bool, &str); 4] = [
            (self.require_uppercase, char::is_uppercase, "an uppercase letter"),
            (self.require_lowercase, char::is_lowercase, "a lowercase letter"),
            (self.require_number, char::is_numeric, "a number"),
            (self.require_special, |c| !c.is_alphanumeric(), "a special character"),
        ];

        match rules
            .iter()
            .find(|(enabled, matches, _)| *enabled && !password.chars().any(*matches))
        {
            Some((_, _, missing)) => Err(AuthError::WeakPassword(format!(
                "password must contain {}",
                missing
            ))),
            None => Ok(()),
        }
    }
}

/// One-way password hashing primitive
///
/// `verify` must compare in constant time and must return `false` (not an
/// error) for a malformed stored hash.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into an opaque, self-describing string
    fn hash(&self, plaintext: &str) -> AuthResult<String>;

    /// Check a plaintext password against a stored hash
    fn verify(&self, hash: &str, plaintext: &str) -> bool;
}

/// Argon2id with default parameters and a fresh random salt per hash
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|phc| phc.to_string())
            .map_err(|_| AuthError::HashingFailed)
    }

    fn verify(&self, hash: &str, plaintext: &str) -> bool {
        PasswordHash::new(hash).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

/// Fresh URL-safe token from the OS random source
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest under which a token is stored and looked up
pub fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
