//! Application Services
//!
//! Process-wide collaborators built once from [`AuthConfig`] and handed to
//! every use case by `Arc`.

use std::sync::Arc;

use platform::password::{ClearTextPassword, HashedPassword, PasswordHasher};

use crate::application::config::AuthConfig;
use crate::application::oauth_state::OAuthStateCodec;
use crate::application::token_codec::TokenCodec;
use crate::domain::gateway::{EmailSender, IdentityProvider};
use crate::domain::repository::{
    AuditLogRepository, EphemeralTokenRepository, RefreshSessionRepository, UserRepository,
};
use crate::error::AuthResult;

/// Everything the orchestrator needs from persistence
pub trait AuthStore:
    UserRepository
    + RefreshSessionRepository
    + EphemeralTokenRepository
    + AuditLogRepository
    + Send
    + Sync
    + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository
        + RefreshSessionRepository
        + EphemeralTokenRepository
        + AuditLogRepository
        + Send
        + Sync
        + 'static
{
}

pub trait Mailer: EmailSender + Send + Sync + 'static {}

impl<T> Mailer for T where T: EmailSender + Send + Sync + 'static {}

pub trait OAuthClient: IdentityProvider + Send + Sync + 'static {}

impl<T> OAuthClient for T where T: IdentityProvider + Send + Sync + 'static {}

pub struct AuthServices {
    pub config: Arc<AuthConfig>,
    pub tokens: TokenCodec,
    pub passwords: PasswordHasher,
    pub oauth_state: OAuthStateCodec,
    /// Verified against when the user does not exist, so unknown-user and
    /// wrong-password logins cost the same
    pub(crate) dummy_hash: HashedPassword,
}

impl AuthServices {
    pub fn new(config: Arc<AuthConfig>) -> AuthResult<Self> {
        let passwords = PasswordHasher::new()?;
        let dummy_hash =
            passwords.hash(&ClearTextPassword::new(platform::crypto::random_token()))?;

        Ok(Self {
            tokens: TokenCodec::new(&config),
            oauth_state: OAuthStateCodec::new(&config.oauth),
            passwords,
            dummy_hash,
            config,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}
