//! Login Use Case
//!
//! Password login. Unknown user, disabled local identity and wrong password
//! all fail with the same `InvalidCredentials`.

use std::sync::Arc;

use platform::client::ClientMeta;
use platform::password::ClearTextPassword;

use crate::application::audit;
use crate::application::services::{AuthServices, AuthStore};
use crate::application::session::{AuthTokens, start_session};
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::value_object::{email::Email, ids::UserId};
use crate::error::{AuthError, AuthResult};

pub struct LoginInput {
    pub email: String,
    pub password: String,
}

pub struct LoginUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    services: Arc<AuthServices>,
}

impl<S> LoginUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>, services: Arc<AuthServices>) -> Self {
        Self { store, services }
    }

    pub async fn execute(&self, input: LoginInput, client: ClientMeta) -> AuthResult<AuthTokens> {
        let password = ClearTextPassword::new(input.password);

        let user = match Email::new(&input.email) {
            Ok(email) => self.store.find_user_by_local_username(&email).await?,
            Err(_) => None,
        };

        let Some(user) = user.filter(|u| u.enabled_local().is_some()) else {
            // Same Argon2 cost as a real check
            let _ = self
                .services
                .passwords
                .verify(&self.services.dummy_hash, &password);
            tracing::warn!(reason = "unknown_user", "Login failed");
            self.record_failure(None, "unknown_user", &client).await;
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = user
            .enabled_local()
            .is_some_and(|local| self.services.passwords.verify(&local.password_hash, &password));
        if !password_ok {
            tracing::warn!(user_id = %user.user_id, reason = "wrong_password", "Login failed");
            self.record_failure(Some(user.user_id), "wrong_password", &client)
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        if self.services.config().require_verified_email && !user.is_email_verified() {
            tracing::info!(user_id = %user.user_id, "Login blocked: email not verified");
            self.record_failure(Some(user.user_id), "email_not_verified", &client)
                .await;
            return Err(AuthError::EmailNotVerified);
        }

        let user_id = user.user_id;
        let event = AuditEvent::new(AuditAction::LoginSuccess, Some(user_id), &client)
            .with("method", "password");
        let tokens = start_session(self.store.as_ref(), &self.services, user, client).await?;
        audit::record(self.store.as_ref(), event).await;

        tracing::info!(user_id = %user_id, "User logged in");

        Ok(tokens)
    }

    async fn record_failure(&self, user_id: Option<UserId>, reason: &str, client: &ClientMeta) {
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::LoginFailure, user_id, client).with("reason", reason),
        )
        .await;
    }
}
