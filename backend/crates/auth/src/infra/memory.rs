//! In-Memory Repository
//!
//! Same contract as the PostgreSQL repository, uniqueness constraints
//! included, for tests and database-less local runs. A single mutex guards
//! all tables; it is never held across an await point.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use platform::password::HashedPassword;

use crate::domain::entity::{
    audit_event::AuditEvent,
    ephemeral_token::{EphemeralToken, EphemeralTokenKind},
    refresh_session::RefreshSession,
    user::{MergedIdentities, User},
};
use crate::domain::repository::{
    AuditLogRepository, EphemeralTokenRepository, PasswordResetApplied, RefreshSessionRepository,
    UserRepository,
};
use crate::domain::value_object::{
    email::Email,
    identity::ProviderSubject,
    ids::{RefreshSessionId, UserId},
};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    sessions: HashMap<RefreshSessionId, RefreshSession>,
    tokens: Vec<EphemeralToken>,
    audit: Vec<AuditEvent>,
}

impl Tables {
    /// Mirrors the unique constraints of `auth_users`
    fn check_unique(&self, user: &User) -> AuthResult<()> {
        for other in self.users.values().filter(|u| u.user_id != user.user_id) {
            if let (Some(mine), Some(theirs)) = (user.local_username(), other.local_username())
                && mine == theirs
            {
                return Err(AuthError::EmailInUse);
            }
            if let Some(google) = &user.google
                && other.holds(&ProviderSubject::Google {
                    subject: google.subject.clone(),
                })
            {
                return Err(AuthError::AlreadyLinkedElsewhere);
            }
            if let Some(ms) = &user.microsoft
                && other.holds(&ProviderSubject::Microsoft {
                    tenant_id: ms.tenant_id,
                    object_id: ms.object_id,
                })
            {
                return Err(AuthError::AlreadyLinkedElsewhere);
            }
        }
        Ok(())
    }

    /// Version check shared by every conditional user write
    fn current_user(&mut self, user: &User) -> AuthResult<&mut User> {
        let stored = self
            .users
            .get_mut(&user.user_id)
            .ok_or(AuthError::UserNotFound)?;
        if stored.version != user.version {
            return Err(AuthError::ConcurrentUpdate);
        }
        Ok(stored)
    }

    fn revoke_sessions_of(&mut self, user_id: &UserId) -> u64 {
        let now = Utc::now();
        let mut revoked = 0;
        for session in self
            .sessions
            .values_mut()
            .filter(|s| s.user_id == *user_id && s.revoked_at.is_none())
        {
            session.revoked_at = Some(now);
            revoked += 1;
        }
        revoked
    }

    /// Index of a usable token; nothing is changed yet
    fn usable_token(&self, token_hash: &str, kind: EphemeralTokenKind) -> Option<usize> {
        let now = Utc::now();
        self.tokens
            .iter()
            .position(|t| t.token_hash == token_hash && t.kind == kind && t.is_usable_at(now))
    }

    fn delete_user(&mut self, user_id: &UserId) -> Option<User> {
        let user = self.users.remove(user_id)?;
        self.sessions.retain(|_, s| s.user_id != *user_id);
        self.tokens.retain(|t| t.user_id != *user_id);
        Some(user)
    }
}

#[derive(Default)]
pub struct InMemoryAuthRepository {
    tables: Mutex<Tables>,
}

impl InMemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AuthResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AuthError::Internal("In-memory store lock poisoned".to_string()))
    }

    /// Number of stored sessions, active or not
    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.lock().map(|t| t.sessions.len()).unwrap_or_default()
    }

    #[cfg(test)]
    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.lock().map(|t| t.audit.clone()).unwrap_or_default()
    }

    /// Rewrite a stored user in place, bypassing the version check
    #[cfg(test)]
    pub fn modify_user(&self, user_id: &UserId, f: impl FnOnce(&mut User)) -> AuthResult<()> {
        let mut tables = self.lock()?;
        let user = tables.users.get_mut(user_id).ok_or(AuthError::UserNotFound)?;
        f(user);
        Ok(())
    }

    /// Shift every expiry of `user_id` into the past
    #[cfg(test)]
    pub fn expire_all_for(&self, user_id: &UserId) -> AuthResult<()> {
        let past = Utc::now() - chrono::Duration::seconds(1);
        let mut tables = self.lock()?;
        for session in tables.sessions.values_mut().filter(|s| s.user_id == *user_id) {
            session.expires_at = past;
        }
        for token in tables.tokens.iter_mut().filter(|t| t.user_id == *user_id) {
            token.expires_at = past;
        }
        Ok(())
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for InMemoryAuthRepository {
    async fn create_user(&self, user: &User) -> AuthResult<()> {
        let mut tables = self.lock()?;
        if tables.users.contains_key(&user.user_id) {
            return Err(AuthError::Internal("Duplicate user id".to_string()));
        }
        tables.check_unique(user)?;
        tables.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.lock()?.users.get(user_id).cloned())
    }

    async fn find_user_by_local_username(&self, username: &Email) -> AuthResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.local_username() == Some(username))
            .cloned())
    }

    async fn find_user_by_provider_subject(
        &self,
        subject: &ProviderSubject,
    ) -> AuthResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.holds(subject))
            .cloned())
    }

    async fn update_user(&self, user: &User) -> AuthResult<()> {
        let mut tables = self.lock()?;
        tables.current_user(user)?;
        tables.check_unique(user)?;
        let mut stored = user.clone();
        stored.version += 1;
        tables.users.insert(user.user_id, stored);
        Ok(())
    }

    async fn replace_password(
        &self,
        user: &User,
        password_hash: &HashedPassword,
    ) -> AuthResult<u64> {
        let mut tables = self.lock()?;
        let stored = tables.current_user(user)?;
        let local = stored.local.as_mut().ok_or(AuthError::IdentityNotLinked)?;
        local.password_hash = password_hash.clone();
        stored.updated_at = Utc::now();
        stored.version += 1;
        Ok(tables.revoke_sessions_of(&user.user_id))
    }

    async fn merge_users(
        &self,
        source: &UserId,
        destination: &UserId,
    ) -> AuthResult<MergedIdentities> {
        let mut tables = self.lock()?;
        let (Some(source_user), Some(destination_user)) =
            (tables.users.get(source), tables.users.get(destination))
        else {
            return Err(AuthError::UserNotFound);
        };

        // Work on a copy so a conflict leaves both accounts untouched
        let mut merged_user = destination_user.clone();
        let merged = merged_user.absorb(source_user.clone())?;

        merged_user.version += 1;
        tables.delete_user(source);
        tables.users.insert(*destination, merged_user);
        Ok(merged)
    }
}

// ============================================================================
// Refresh Session Repository Implementation
// ============================================================================

impl RefreshSessionRepository for InMemoryAuthRepository {
    async fn create_session(&self, session: &RefreshSession) -> AuthResult<()> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&session.user_id) {
            return Err(AuthError::UserNotFound);
        }
        tables.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_active_session(&self, token_hash: &str) -> AuthResult<Option<RefreshSession>> {
        let now = Utc::now();
        Ok(self
            .lock()?
            .sessions
            .values()
            .find(|s| s.token_hash == token_hash && s.is_active_at(now))
            .cloned())
    }

    async fn rotate_session(
        &self,
        current: &RefreshSessionId,
        replacement: &RefreshSession,
    ) -> AuthResult<bool> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        match tables.sessions.get_mut(current) {
            Some(session) if session.is_active_at(now) => session.revoked_at = Some(now),
            _ => return Ok(false),
        }
        tables
            .sessions
            .insert(replacement.session_id, replacement.clone());
        Ok(true)
    }

    async fn revoke_session_by_hash(&self, token_hash: &str) -> AuthResult<Option<UserId>> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        let session = tables
            .sessions
            .values_mut()
            .find(|s| s.token_hash == token_hash && s.revoked_at.is_none());
        Ok(session.map(|session| {
            session.revoked_at = Some(now);
            session.user_id
        }))
    }

    async fn revoke_all_sessions(&self, user_id: &UserId) -> AuthResult<u64> {
        Ok(self.lock()?.revoke_sessions_of(user_id))
    }

    async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

// ============================================================================
// Ephemeral Token Repository Implementation
// ============================================================================

impl EphemeralTokenRepository for InMemoryAuthRepository {
    async fn replace_token(&self, token: &EphemeralToken) -> AuthResult<()> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&token.user_id) {
            return Err(AuthError::UserNotFound);
        }
        tables.tokens.retain(|t| {
            !(t.user_id == token.user_id && t.kind == token.kind && t.used_at.is_none())
        });
        tables.tokens.push(token.clone());
        Ok(())
    }

    async fn find_usable_token(
        &self,
        token_hash: &str,
        kind: EphemeralTokenKind,
    ) -> AuthResult<Option<EphemeralToken>> {
        let now = Utc::now();
        Ok(self
            .lock()?
            .tokens
            .iter()
            .find(|t| t.token_hash == token_hash && t.kind == kind && t.is_usable_at(now))
            .cloned())
    }

    async fn complete_email_verification(&self, token_hash: &str) -> AuthResult<Option<UserId>> {
        let mut tables = self.lock()?;
        let Some(index) = tables.usable_token(token_hash, EphemeralTokenKind::EmailVerification)
        else {
            return Ok(None);
        };

        let user_id = tables.tokens[index].user_id;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        user.mark_email_verified();
        user.version += 1;
        tables.tokens[index].used_at = Some(Utc::now());
        Ok(Some(user_id))
    }

    async fn complete_password_reset(
        &self,
        token_hash: &str,
        password_hash: &HashedPassword,
    ) -> AuthResult<Option<PasswordResetApplied>> {
        let mut tables = self.lock()?;
        let Some(index) = tables.usable_token(token_hash, EphemeralTokenKind::PasswordReset) else {
            return Ok(None);
        };

        let user_id = tables.tokens[index].user_id;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(AuthError::InvalidOrExpiredToken)?;
        // Checked before anything changes so a failure leaves the token usable
        let local = user.local.as_mut().ok_or(AuthError::IdentityNotLinked)?;
        local.password_hash = password_hash.clone();
        user.updated_at = Utc::now();
        user.version += 1;

        tables.tokens[index].used_at = Some(Utc::now());
        let sessions_revoked = tables.revoke_sessions_of(&user_id);
        Ok(Some(PasswordResetApplied {
            user_id,
            sessions_revoked,
        }))
    }

    async fn purge_expired_tokens(&self) -> AuthResult<u64> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        let before = tables.tokens.len();
        tables
            .tokens
            .retain(|t| t.expires_at > now && t.used_at.is_none());
        Ok((before - tables.tokens.len()) as u64)
    }
}

// ============================================================================
// Audit Log Repository Implementation
// ============================================================================

impl AuditLogRepository for InMemoryAuthRepository {
    async fn record_event(&self, event: &AuditEvent) -> AuthResult<()> {
        self.lock()?.audit.push(event.clone());
        Ok(())
    }
}
