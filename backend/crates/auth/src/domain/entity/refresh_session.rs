//! Refresh Session Entity
//!
//! Server-side record of one issued refresh token. Only the SHA-256 of the
//! raw token is stored.

use chrono::{DateTime, Duration, Utc};
use platform::client::ClientMeta;

use crate::domain::value_object::ids::{RefreshSessionId, UserId};

#[derive(Debug, Clone)]
pub struct RefreshSession {
    /// Also embedded in the refresh token as `sessionId`
    pub session_id: RefreshSessionId,
    pub user_id: UserId,
    /// Lowercase hex SHA-256 of the raw refresh token
    pub token_hash: String,
    pub client: ClientMeta,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshSession {
    /// The id is chosen before the token is signed, so it is passed in.
    pub fn new(
        session_id: RefreshSessionId,
        user_id: UserId,
        token_hash: String,
        client: ClientMeta,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id,
            token_hash,
            client,
            expires_at: now + ttl,
            revoked_at: None,
            created_at: now,
        }
    }

    /// Neither revoked nor expired at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_window() {
        let mut session = RefreshSession::new(
            RefreshSessionId::new(),
            UserId::new(),
            "hash".into(),
            ClientMeta::default(),
            Duration::days(7),
        );
        let now = Utc::now();
        assert!(session.is_active_at(now));
        assert!(!session.is_active_at(now + Duration::days(8)));

        session.revoked_at = Some(now);
        assert!(!session.is_active_at(now));
    }
}
