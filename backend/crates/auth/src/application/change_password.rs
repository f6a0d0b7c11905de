//! Change Password Use Case
//!
//! For a signed-in user who knows the current password. Every refresh
//! session of the account is revoked with the same write, this device's
//! included.

use std::sync::Arc;

use platform::client::ClientMeta;
use platform::password::{ClearTextPassword, validate_strength};

use crate::application::audit;
use crate::application::services::{AuthServices, AuthStore};
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::value_object::ids::UserId;
use crate::error::{AuthError, AuthResult};

pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

pub struct ChangePasswordUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    services: Arc<AuthServices>,
}

impl<S> ChangePasswordUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>, services: Arc<AuthServices>) -> Self {
        Self { store, services }
    }

    /// Returns how many sessions were revoked
    pub async fn execute(
        &self,
        user_id: UserId,
        input: ChangePasswordInput,
        client: ClientMeta,
    ) -> AuthResult<u64> {
        let user = self
            .store
            .find_user_by_id(&user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let local = user.enabled_local().ok_or(AuthError::IdentityNotLinked)?;

        let current = ClearTextPassword::new(input.current_password);
        if !self.services.passwords.verify(&local.password_hash, &current) {
            tracing::warn!(user_id = %user_id, "Password change with wrong current password");
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let password = ClearTextPassword::new(input.new_password);
        let report = validate_strength(&password, user.primary_email());
        if !report.is_valid() {
            return Err(AuthError::WeakPassword(report.messages()));
        }
        let password_hash = self.services.passwords.hash(&password)?;

        // Fails ConcurrentUpdate if a reset or merge landed since the read
        let revoked = self.store.replace_password(&user, &password_hash).await?;

        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::PasswordChanged, Some(user_id), &client)
                .with("sessions_revoked", revoked),
        )
        .await;

        tracing::info!(user_id = %user_id, sessions_revoked = revoked, "Password changed");
        Ok(revoked)
    }
}
