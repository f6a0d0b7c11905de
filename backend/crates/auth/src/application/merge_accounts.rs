//! Merge Accounts Use Case (sysadmin)
//!
//! Moves every identity slot of the source account onto the destination
//! and deletes the source. The store performs it as one transaction.

use std::sync::Arc;

use platform::client::ClientMeta;

use crate::application::audit;
use crate::application::services::AuthStore;
use crate::domain::entity::{
    audit_event::{AuditAction, AuditEvent},
    user::MergedIdentities,
};
use crate::domain::value_object::ids::UserId;
use crate::error::{AuthError, AuthResult};

pub struct MergeAccountsUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
}

impl<S> MergeAccountsUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        source: UserId,
        destination: UserId,
        acting_user: UserId,
        client: ClientMeta,
    ) -> AuthResult<MergedIdentities> {
        if source == destination {
            return Err(AuthError::SameAccount);
        }

        let merged = self.store.merge_users(&source, &destination).await?;

        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::AccountsMerged, Some(acting_user), &client)
                .with("source_user_id", source.to_string())
                .with("destination_user_id", destination.to_string())
                .with("local", merged.local)
                .with("google", merged.google)
                .with("microsoft", merged.microsoft),
        )
        .await;

        tracing::info!(
            source_user_id = %source,
            destination_user_id = %destination,
            acting_user_id = %acting_user,
            local = merged.local,
            google = merged.google,
            microsoft = merged.microsoft,
            "Accounts merged"
        );
        Ok(merged)
    }
}
