//! Logout Use Cases

use std::sync::Arc;

use platform::client::ClientMeta;
use platform::crypto::sha256_hex;

use crate::application::audit;
use crate::application::services::AuthStore;
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::value_object::ids::UserId;
use crate::error::AuthResult;

pub struct LogoutUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
}

impl<S> LogoutUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Idempotent: unknown, revoked and malformed tokens succeed too.
    pub async fn execute(&self, refresh_token: &str, client: ClientMeta) -> AuthResult<()> {
        let owner = self
            .store
            .revoke_session_by_hash(&sha256_hex(refresh_token))
            .await?;

        match owner {
            Some(user_id) => {
                audit::record(
                    self.store.as_ref(),
                    AuditEvent::new(AuditAction::Logout, Some(user_id), &client),
                )
                .await;
                tracing::info!(user_id = %user_id, "Refresh session revoked (logout)");
            }
            None => tracing::debug!("Logout with no active session"),
        }
        Ok(())
    }

    /// Revoke every session of `user_id`; returns how many were active
    pub async fn execute_all(&self, user_id: UserId, client: ClientMeta) -> AuthResult<u64> {
        let revoked = self.store.revoke_all_sessions(&user_id).await?;
        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::LogoutAll, Some(user_id), &client)
                .with("sessions_revoked", revoked),
        )
        .await;
        tracing::info!(user_id = %user_id, revoked, "All sessions revoked (logout-all)");
        Ok(revoked)
    }
}
