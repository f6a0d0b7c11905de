//! Refresh Use Case
//!
//! Rotation on use: the presented refresh token's session is revoked and a
//! replacement created in one conditional write. Of two concurrent callers
//! presenting the same token, only one wins.

use std::sync::Arc;

use platform::client::ClientMeta;
use platform::crypto::sha256_hex;

use crate::application::audit;
use crate::application::services::{AuthServices, AuthStore};
use crate::application::session::{AuthTokens, access_token_for, mint_session};
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::error::{AuthError, AuthResult};

pub struct RefreshUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    services: Arc<AuthServices>,
}

impl<S> RefreshUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>, services: Arc<AuthServices>) -> Self {
        Self { store, services }
    }

    /// Every failure is `InvalidRefreshToken`
    pub async fn execute(&self, refresh_token: &str, client: ClientMeta) -> AuthResult<AuthTokens> {
        let claims = self.services.tokens.verify_refresh(refresh_token)?;

        let session = self
            .store
            .find_active_session(&sha256_hex(refresh_token))
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    session_id = %claims.session_id,
                    "Refresh token without an active session (expired, revoked or reused)"
                );
                AuthError::InvalidRefreshToken
            })?;

        if session.session_id != claims.session_id || session.user_id != claims.sub {
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = self
            .store
            .find_user_by_id(&session.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let event = AuditEvent::new(AuditAction::RefreshTokenRotated, Some(user.user_id), &client)
            .with("old_session_id", session.session_id.to_string());
        let minted = mint_session(&self.services, &user, client)?;
        if !self
            .store
            .rotate_session(&session.session_id, &minted.session)
            .await?
        {
            tracing::warn!(
                user_id = %user.user_id,
                session_id = %session.session_id,
                "Refresh token lost a concurrent rotation"
            );
            return Err(AuthError::InvalidRefreshToken);
        }

        audit::record(
            self.store.as_ref(),
            event.with("new_session_id", minted.session.session_id.to_string()),
        )
        .await;

        tracing::info!(
            user_id = %user.user_id,
            old_session_id = %session.session_id,
            new_session_id = %minted.session.session_id,
            "Refresh session rotated"
        );

        Ok(AuthTokens {
            access_token: access_token_for(&self.services, &user)?,
            refresh_token: minted.refresh_token,
            user,
        })
    }
}
