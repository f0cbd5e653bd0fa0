//! Password value object - Domain layer password handling.
//!
//! Hashing uses Argon2id with the crate's default parameters; the work factor
//! is fixed so every stored hash costs the same to verify.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

use crate::constants::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};
use crate::error::{DomainError, DomainResult, ErrorCode};

/// Real hash used to burn the same CPU time when the account does not exist.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| Password::hash("dummy-password-for-timing-1").ok());

/// Salted password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    hash: String,
}

// Don't expose hash in debug output (security)
impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

impl Password {
    /// Validate the plain text and hash it.
    ///
    /// # Errors
    /// `Validation(InvalidPassword)` when the plain text breaks the password rules,
    /// `Internal(PasswordHashFailed)` when hashing fails.
    pub fn new(plain_text: &str) -> DomainResult<Self> {
        Self::validate(plain_text)?;
        let hash = Self::hash(plain_text)?;
        Ok(Self { hash })
    }

    /// 8 to 128 characters with at least one letter and one digit.
    pub fn validate(plain_text: &str) -> DomainResult<()> {
        let len = plain_text.chars().count();
        if len < MIN_PASSWORD_LENGTH {
            return Err(invalid(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        if len > MAX_PASSWORD_LENGTH {
            return Err(invalid(format!(
                "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
            )));
        }
        if !plain_text.chars().any(char::is_alphabetic) {
            return Err(invalid("Password must contain at least one letter"));
        }
        if !plain_text.chars().any(|c| c.is_ascii_digit()) {
            return Err(invalid("Password must contain at least one digit"));
        }
        Ok(())
    }

    /// Wrap an existing hash (from storage).
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }

    pub fn into_string(self) -> String {
        self.hash
    }

    /// Verify a plain text password against this hash. Malformed hashes never verify.
    pub fn verify(&self, plain_text: &str) -> bool {
        Self::verify_hash(plain_text, &self.hash)
    }

    /// Run a full verification against a throwaway hash and report failure.
    pub fn verify_dummy(plain_text: &str) -> bool {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = Self::verify_hash(plain_text, hash);
        }
        false
    }

    fn hash(plain_text: &str) -> DomainResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Self::argon2()
            .hash_password(plain_text.as_bytes(), &salt)
            .map_err(|e| {
                DomainError::internal(
                    ErrorCode::PasswordHashFailed,
                    format!("Password hash failed: {e}"),
                )
            })?;
        Ok(hash.to_string())
    }

    fn verify_hash(plain_text: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Self::argon2()
                .verify_password(plain_text.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    #[inline]
    fn argon2() -> Argon2<'static> {
        Argon2::default()
    }
}

impl From<Password> for String {
    fn from(password: Password) -> Self {
        password.hash
    }
}

fn invalid(msg: impl Into<String>) -> DomainError {
    DomainError::validation(ErrorCode::InvalidPassword, msg)
}
