//! Audit Event Entity
//!
//! Append-only record of security-relevant account activity. Rows outlive
//! the accounts they mention (a merge deletes its source user).

use chrono::{DateTime, Utc};
use platform::client::ClientMeta;
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::value_object::ids::{AuditEventId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Register,
    LoginSuccess,
    LoginFailure,
    RefreshTokenRotated,
    Logout,
    LogoutAll,
    EmailVerified,
    PasswordReset,
    PasswordChanged,
    OAuthLogin,
    OAuthRegister,
    OAuthEmailUpdated,
    IdentityLinked,
    IdentityUnlinked,
    AccountsMerged,
}

impl AuditAction {
    pub const fn code(&self) -> &'static str {
        match self {
            AuditAction::Register => "REGISTER",
            AuditAction::LoginSuccess => "LOGIN_SUCCESS",
            AuditAction::LoginFailure => "LOGIN_FAILURE",
            AuditAction::RefreshTokenRotated => "REFRESH_TOKEN_ROTATED",
            AuditAction::Logout => "LOGOUT",
            AuditAction::LogoutAll => "LOGOUT_ALL",
            AuditAction::EmailVerified => "EMAIL_VERIFIED",
            AuditAction::PasswordReset => "PASSWORD_RESET",
            AuditAction::PasswordChanged => "PASSWORD_CHANGED",
            AuditAction::OAuthLogin => "OAUTH_LOGIN",
            AuditAction::OAuthRegister => "OAUTH_REGISTER",
            AuditAction::OAuthEmailUpdated => "OAUTH_EMAIL_UPDATED",
            AuditAction::IdentityLinked => "IDENTITY_LINKED",
            AuditAction::IdentityUnlinked => "IDENTITY_UNLINKED",
            AuditAction::AccountsMerged => "ACCOUNTS_MERGED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_id: AuditEventId,
    /// `None` when the actor is unknown (e.g. a login for a missing account)
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub metadata: Map<String, Value>,
    pub client: ClientMeta,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, user_id: Option<UserId>, client: &ClientMeta) -> Self {
        Self {
            event_id: AuditEventId::new(),
            user_id,
            action,
            metadata: Map::new(),
            client: client.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_accumulates() {
        let event = AuditEvent::new(AuditAction::LoginFailure, None, &ClientMeta::default())
            .with("reason", "unknown_user")
            .with("attempt", 2);
        assert_eq!(event.metadata["reason"], "unknown_user");
        assert_eq!(event.metadata["attempt"], 2);
        assert_eq!(event.action.to_string(), "LOGIN_FAILURE");
    }
}
