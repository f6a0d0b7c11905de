//! Email Verification Use Cases

use std::sync::Arc;

use platform::client::ClientMeta;
use platform::crypto::sha256_hex;

use crate::application::audit;
use crate::application::config::to_chrono;
use crate::application::ephemeral::issue_ephemeral;
use crate::application::services::{AuthServices, AuthStore, Mailer};
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::entity::ephemeral_token::EphemeralTokenKind;
use crate::domain::value_object::ids::UserId;
use crate::error::{AuthError, AuthResult};

pub struct VerifyEmailUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
}

impl<S> VerifyEmailUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Token consumption and the verified flag commit together
    pub async fn execute(&self, token: &str, client: ClientMeta) -> AuthResult<()> {
        let user_id = self
            .store
            .complete_email_verification(&sha256_hex(token))
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::EmailVerified, Some(user_id), &client),
        )
        .await;

        tracing::info!(user_id = %user_id, "Email verified");
        Ok(())
    }
}

/// Sends a new link to a logged-in, still unverified user
pub struct ResendVerificationUseCase<S, M>
where
    S: AuthStore,
    M: Mailer,
{
    store: Arc<S>,
    mailer: Arc<M>,
    services: Arc<AuthServices>,
}

impl<S, M> ResendVerificationUseCase<S, M>
where
    S: AuthStore,
    M: Mailer,
{
    pub fn new(store: Arc<S>, mailer: Arc<M>, services: Arc<AuthServices>) -> Self {
        Self {
            store,
            mailer,
            services,
        }
    }

    pub async fn execute(&self, user_id: UserId) -> AuthResult<()> {
        let user = self
            .store
            .find_user_by_id(&user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_email_verified() {
            return Err(AuthError::Validation("Email already verified".to_string()));
        }
        let to = user
            .primary_email()
            .ok_or_else(|| AuthError::Validation("No email address on file".to_string()))?;

        let token = issue_ephemeral(
            self.store.as_ref(),
            user.user_id,
            EphemeralTokenKind::EmailVerification,
            to_chrono(self.services.config().email_verification_ttl),
        )
        .await?;

        self.mailer
            .send_verification(to, user.full_name.as_str(), &token)
            .await?;

        tracing::info!(user_id = %user.user_id, "Verification email resent");
        Ok(())
    }
}
