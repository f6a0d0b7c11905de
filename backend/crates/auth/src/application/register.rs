//! Register Use Case
//!
//! Creates a local account and sends a verification link. Does not log the
//! user in.

use std::sync::Arc;

use platform::client::ClientMeta;
use platform::password::{ClearTextPassword, validate_strength};

use crate::application::audit;
use crate::application::config::to_chrono;
use crate::application::ephemeral::issue_ephemeral;
use crate::application::services::{AuthServices, AuthStore, Mailer};
use crate::domain::entity::{
    audit_event::{AuditAction, AuditEvent},
    ephemeral_token::EphemeralTokenKind,
    user::User,
};
use crate::domain::value_object::{email::Email, full_name::FullName};
use crate::error::{AuthError, AuthResult};

pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
    /// Only honored when the configuration allows it
    pub autoverify: bool,
}

pub struct RegisterOutput {
    pub user: User,
}

pub struct RegisterUseCase<S, M>
where
    S: AuthStore,
    M: Mailer,
{
    store: Arc<S>,
    mailer: Arc<M>,
    services: Arc<AuthServices>,
}

impl<S, M> RegisterUseCase<S, M>
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

    pub async fn execute(
        &self,
        input: RegisterInput,
        client: ClientMeta,
    ) -> AuthResult<RegisterOutput> {
        let email = Email::new(&input.email)?;
        let full_name = FullName::new(&input.full_name)?;

        let password = ClearTextPassword::new(input.password);
        let report = validate_strength(&password, Some(email.as_str()));
        if !report.is_valid() {
            return Err(AuthError::WeakPassword(report.messages()));
        }

        if self
            .store
            .find_user_by_local_username(&email)
            .await?
            .is_some()
        {
            return Err(AuthError::EmailInUse);
        }

        let password_hash = self.services.passwords.hash(&password)?;
        let mut user = User::new_local(email, password_hash, full_name);

        let config = self.services.config();
        let autoverify = input.autoverify && config.allow_autoverify;
        if input.autoverify && !autoverify {
            tracing::debug!("autoverify requested but not allowed, ignoring");
        }
        if autoverify {
            user.mark_email_verified();
        }

        // A concurrent registration surfaces here as EmailInUse
        self.store.create_user(&user).await?;

        if !autoverify {
            let token = issue_ephemeral(
                self.store.as_ref(),
                user.user_id,
                EphemeralTokenKind::EmailVerification,
                to_chrono(config.email_verification_ttl),
            )
            .await?;
            let to = user.primary_email().unwrap_or_default();
            if let Err(e) = self
                .mailer
                .send_verification(to, user.full_name.as_str(), &token)
                .await
            {
                tracing::warn!(user_id = %user.user_id, error = %e, "Failed to send verification email");
            }
        }

        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::Register, Some(user.user_id), &client)
                .with("autoverified", autoverify),
        )
        .await;

        tracing::info!(
            user_id = %user.user_id,
            autoverified = autoverify,
            "User registered"
        );

        Ok(RegisterOutput { user })
    }
}
