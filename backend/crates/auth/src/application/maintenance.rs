//! Expired-row cleanup, safe to run concurrently from several instances.

use crate::application::services::AuthStore;
use crate::error::AuthResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub sessions: u64,
    pub tokens: u64,
}

pub async fn purge_expired<S: AuthStore>(store: &S) -> AuthResult<PurgeReport> {
    let report = PurgeReport {
        sessions: store.purge_expired_sessions().await?,
        tokens: store.purge_expired_tokens().await?,
    };
    tracing::info!(
        sessions = report.sessions,
        tokens = report.tokens,
        "Expired auth rows purged"
    );
    Ok(report)
}
