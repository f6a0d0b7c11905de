//! Ephemeral Token Entity
//!
//! Single-use, time-boxed proof sent out of band (verification and reset
//! links). The raw value exists only in the e-mail; the row keeps its hash.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::domain::value_object::ids::{EphemeralTokenId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EphemeralTokenKind {
    EmailVerification,
    PasswordReset,
}

impl EphemeralTokenKind {
    pub const fn code(&self) -> &'static str {
        match self {
            EphemeralTokenKind::EmailVerification => "email_verification",
            EphemeralTokenKind::PasswordReset => "password_reset",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "email_verification" => Some(EphemeralTokenKind::EmailVerification),
            "password_reset" => Some(EphemeralTokenKind::PasswordReset),
            _ => None,
        }
    }
}

impl fmt::Display for EphemeralTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone)]
pub struct EphemeralToken {
    pub token_id: EphemeralTokenId,
    pub user_id: UserId,
    pub kind: EphemeralTokenKind,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EphemeralToken {
    pub fn new(user_id: UserId, kind: EphemeralTokenKind, token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token_id: EphemeralTokenId::new(),
            user_id,
            kind,
            token_hash,
            expires_at: now + ttl,
            used_at: None,
            created_at: now,
        }
    }

    /// Unused and unexpired at `now`
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        for kind in [
            EphemeralTokenKind::EmailVerification,
            EphemeralTokenKind::PasswordReset,
        ] {
            assert_eq!(EphemeralTokenKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(EphemeralTokenKind::from_code("magic_link"), None);
    }

    #[test]
    fn test_usable_window() {
        let mut token = EphemeralToken::new(
            UserId::new(),
            EphemeralTokenKind::PasswordReset,
            "hash".into(),
            Duration::hours(1),
        );
        let now = Utc::now();
        assert!(token.is_usable_at(now));
        assert!(!token.is_usable_at(now + Duration::hours(2)));
        token.used_at = Some(now);
        assert!(!token.is_usable_at(now));
    }
}
