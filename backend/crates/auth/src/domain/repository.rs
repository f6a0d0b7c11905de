//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer. Every method that must be race-free under
//! concurrent requests says so; implementations get that from the store
//! (conditional writes, transactions), never from in-process locks.

use platform::password::HashedPassword;

use crate::domain::entity::{
    audit_event::AuditEvent,
    ephemeral_token::{EphemeralToken, EphemeralTokenKind},
    refresh_session::RefreshSession,
    user::{MergedIdentities, User},
};
use crate::domain::value_object::{
    email::Email,
    identity::ProviderSubject,
    ids::{RefreshSessionId, UserId},
};
use crate::error::AuthResult;

#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Fails `EmailInUse` / `AlreadyLinkedElsewhere` on a taken identity
    async fn create_user(&self, user: &User) -> AuthResult<()>;

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    async fn find_user_by_local_username(&self, username: &Email) -> AuthResult<Option<User>>;

    async fn find_user_by_provider_subject(
        &self,
        subject: &ProviderSubject,
    ) -> AuthResult<Option<User>>;

    /// Full overwrite, applied only while the stored version still equals
    /// `user.version`: `ConcurrentUpdate` otherwise, `UserNotFound` when the
    /// row is gone. Same uniqueness failures as `create_user`.
    async fn update_user(&self, user: &User) -> AuthResult<()>;

    /// Set the local password hash and revoke every session of `user`, in
    /// one transaction and under the same version check as `update_user`.
    /// Returns how many sessions were active.
    async fn replace_password(
        &self,
        user: &User,
        password_hash: &HashedPassword,
    ) -> AuthResult<u64>;

    /// Move all slots of `source` onto `destination` and delete `source`
    /// (sessions and tokens included), all or nothing.
    async fn merge_users(
        &self,
        source: &UserId,
        destination: &UserId,
    ) -> AuthResult<MergedIdentities>;
}

#[trait_variant::make(RefreshSessionRepository: Send)]
pub trait LocalRefreshSessionRepository {
    async fn create_session(&self, session: &RefreshSession) -> AuthResult<()>;

    /// Only non-revoked, non-expired sessions match
    async fn find_active_session(&self, token_hash: &str) -> AuthResult<Option<RefreshSession>>;

    /// Revoke `current` if it is still active and insert `replacement`, in
    /// one atomic step. `false` means another caller rotated first.
    async fn rotate_session(
        &self,
        current: &RefreshSessionId,
        replacement: &RefreshSession,
    ) -> AuthResult<bool>;

    /// Owner of the revoked session; `None` when nothing active matched
    async fn revoke_session_by_hash(&self, token_hash: &str) -> AuthResult<Option<UserId>>;

    async fn revoke_all_sessions(&self, user_id: &UserId) -> AuthResult<u64>;

    /// Delete sessions past their expiry, revoked or not; idempotent
    async fn purge_expired_sessions(&self) -> AuthResult<u64>;
}

/// What a completed password reset touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordResetApplied {
    pub user_id: UserId,
    pub sessions_revoked: u64,
}

#[trait_variant::make(EphemeralTokenRepository: Send)]
pub trait LocalEphemeralTokenRepository {
    /// Insert `token`, discarding earlier unused tokens of the same kind
    /// for the same user.
    async fn replace_token(&self, token: &EphemeralToken) -> AuthResult<()>;

    /// Read-only lookup of a usable token
    async fn find_usable_token(
        &self,
        token_hash: &str,
        kind: EphemeralTokenKind,
    ) -> AuthResult<Option<EphemeralToken>>;

    /// Consume a usable verification token and mark its owner verified, in
    /// one transaction. At most one concurrent caller gets `Some`.
    async fn complete_email_verification(&self, token_hash: &str) -> AuthResult<Option<UserId>>;

    /// Consume a usable reset token, set the owner's local password hash and
    /// revoke all of the owner's sessions, in one transaction. `None` leaves
    /// everything untouched; an owner without local credentials fails
    /// `IdentityNotLinked`, also without consuming the token.
    async fn complete_password_reset(
        &self,
        token_hash: &str,
        password_hash: &HashedPassword,
    ) -> AuthResult<Option<PasswordResetApplied>>;

    /// Delete expired and used tokens; idempotent
    async fn purge_expired_tokens(&self) -> AuthResult<u64>;
}

/// Append-only; callers treat a failed write as non-fatal
#[trait_variant::make(AuditLogRepository: Send)]
pub trait LocalAuditLogRepository {
    async fn record_event(&self, event: &AuditEvent) -> AuthResult<()>;
}
