//! Password Reset Use Cases

use std::sync::Arc;

use platform::client::ClientMeta;
use platform::crypto::sha256_hex;
use platform::password::{ClearTextPassword, validate_strength};

use crate::application::audit;
use crate::application::config::to_chrono;
use crate::application::ephemeral::issue_ephemeral;
use crate::application::services::{AuthServices, AuthStore, Mailer};
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::entity::ephemeral_token::EphemeralTokenKind;
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Always succeeds for well-formed input, whether or not the account exists
pub struct RequestPasswordResetUseCase<S, M>
where
    S: AuthStore,
    M: Mailer,
{
    store: Arc<S>,
    mailer: Arc<M>,
    services: Arc<AuthServices>,
}

impl<S, M> RequestPasswordResetUseCase<S, M>
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

    pub async fn execute(&self, email: &str) -> AuthResult<()> {
        let Ok(email) = Email::new(email) else {
            return Ok(());
        };

        let Some(user) = self
            .store
            .find_user_by_local_username(&email)
            .await?
            .filter(|u| u.enabled_local().is_some())
        else {
            tracing::debug!("Password reset requested for unknown account");
            return Ok(());
        };

        let token = issue_ephemeral(
            self.store.as_ref(),
            user.user_id,
            EphemeralTokenKind::PasswordReset,
            to_chrono(self.services.config().password_reset_ttl),
        )
        .await?;

        if let Err(e) = self
            .mailer
            .send_password_reset(email.as_str(), user.full_name.as_str(), &token)
            .await
        {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to send password reset email");
        }

        tracing::info!(user_id = %user.user_id, "Password reset requested");
        Ok(())
    }
}

pub struct ResetPasswordInput {
    pub token: String,
    pub new_password: String,
}

/// Consumes the reset token, sets the new hash and signs out every device,
/// all in one store transaction
pub struct ResetPasswordUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    services: Arc<AuthServices>,
}

impl<S> ResetPasswordUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>, services: Arc<AuthServices>) -> Self {
        Self { store, services }
    }

    pub async fn execute(&self, input: ResetPasswordInput, client: ClientMeta) -> AuthResult<()> {
        let token_hash = sha256_hex(&input.token);

        // Peek first so a weak password does not burn the token
        let pending = self
            .store
            .find_usable_token(&token_hash, EphemeralTokenKind::PasswordReset)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let user = self
            .store
            .find_user_by_id(&pending.user_id)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let password = ClearTextPassword::new(input.new_password);
        let report = validate_strength(&password, user.primary_email());
        if !report.is_valid() {
            return Err(AuthError::WeakPassword(report.messages()));
        }
        let password_hash = self.services.passwords.hash(&password)?;

        let applied = self
            .store
            .complete_password_reset(&token_hash, &password_hash)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::PasswordReset, Some(applied.user_id), &client)
                .with("sessions_revoked", applied.sessions_revoked),
        )
        .await;

        tracing::info!(
            user_id = %applied.user_id,
            sessions_revoked = applied.sessions_revoked,
            "Password reset completed"
        );
        Ok(())
    }
}
