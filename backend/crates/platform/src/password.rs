//! Password Hashing, Verification and Strength Policy
//!
//! - Argon2id with fixed cost parameters (m=19456 KiB, t=2, p=1), encoded
//!   into the PHC string so verification never needs them separately
//! - Zeroization of clear text passwords
//! - Strength validation that reports every violated rule at once

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants
// ============================================================================

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Character classes required out of {upper, lower, digit, special}
pub const MIN_CHARACTER_CLASSES: usize = 3;

/// Argon2id memory cost in KiB
pub const ARGON2_MEMORY_KIB: u32 = 19_456;
pub const ARGON2_ITERATIONS: u32 = 2;
pub const ARGON2_PARALLELISM: u32 = 1;
pub const ARGON2_OUTPUT_LEN: usize = 32;

/// Compared case-insensitively against the whole password
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "passw0rd",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty",
    "qwerty123",
    "qwertyuiop",
    "abc123",
    "abcd1234",
    "letmein",
    "welcome",
    "welcome1",
    "admin123",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "monkey",
    "dragon",
    "master",
    "trustno1",
    "changeme",
];

// ============================================================================
// Error Types
// ============================================================================

/// A single violated strength rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrengthViolation {
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters long")]
    TooShort,

    #[error("Password must be at most {MAX_PASSWORD_LENGTH} characters long")]
    TooLong,

    #[error(
        "Password must contain at least {MIN_CHARACTER_CLASSES} of: uppercase letters, lowercase letters, digits, special characters"
    )]
    TooFewCharacterClasses,

    #[error("Password cannot be the same as your email address")]
    SameAsEmail,

    #[error("Password is too common")]
    Common,
}

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password, NFKC-normalized, wiped from memory on drop
///
/// Not `Clone`; Debug output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Normalizes but does not judge; see [`validate_strength`] for policy.
    pub fn new(raw: impl Into<String>) -> Self {
        let mut raw = raw.into();
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Argon2id hash in PHC string format
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Parse a stored PHC string (e.g. from the database)
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Hasher
// ============================================================================

/// Process-wide Argon2id hasher, built once at startup
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("algorithm", &"argon2id")
            .field("m_cost", &ARGON2_MEMORY_KIB)
            .field("t_cost", &ARGON2_ITERATIONS)
            .field("p_cost", &ARGON2_PARALLELISM)
            .finish()
    }
}

impl PasswordHasher {
    pub fn new() -> Result<Self, PasswordHashError> {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .map_err(|e| PasswordHashError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash with a fresh 16-byte salt
    pub fn hash(&self, password: &ClearTextPassword) -> Result<HashedPassword, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }

    /// Never fails: a malformed or foreign hash simply does not match.
    ///
    /// Cost parameters are read from the PHC string, so hashes made with
    /// older parameters keep verifying.
    pub fn verify(&self, hashed: &HashedPassword, password: &ClearTextPassword) -> bool {
        let Ok(parsed) = PasswordHash::new(&hashed.hash) else {
            return false;
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

// ============================================================================
// Strength Policy
// ============================================================================

/// Result of [`validate_strength`]; empty `violations` means acceptable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrengthReport {
    pub violations: Vec<StrengthViolation>,
}

impl StrengthReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable messages, one per violation
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Check every rule and collect all violations
///
/// Rules: 8..=128 characters, at least three character classes, not equal to
/// `email` (case-insensitive), not on the common-password list.
pub fn validate_strength(password: &ClearTextPassword, email: Option<&str>) -> StrengthReport {
    let value = password.as_str();
    let mut violations = Vec::new();

    let length = value.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        violations.push(StrengthViolation::TooShort);
    }
    if length > MAX_PASSWORD_LENGTH {
        violations.push(StrengthViolation::TooLong);
    }

    if character_classes(value) < MIN_CHARACTER_CLASSES {
        violations.push(StrengthViolation::TooFewCharacterClasses);
    }

    if let Some(email) = email {
        let email = email.trim();
        if !email.is_empty() && value.to_lowercase() == email.to_lowercase() {
            violations.push(StrengthViolation::SameAsEmail);
        }
    }

    let lower = value.to_lowercase();
    if COMMON_PASSWORDS.contains(&lower.as_str()) {
        violations.push(StrengthViolation::Common);
    }

    StrengthReport { violations }
}

fn character_classes(value: &str) -> usize {
    let upper = value.chars().any(char::is_uppercase);
    let lower = value.chars().any(char::is_lowercase);
    let digit = value.chars().any(|c| c.is_ascii_digit());
    let special = value.chars().any(|c| !c.is_alphanumeric());
    [upper, lower, digit, special]
        .into_iter()
        .filter(|present| *present)
        .count()
}

// ============================================================================
// Tests
// ============================================================================
