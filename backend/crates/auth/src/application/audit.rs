//! Audit trail recording

use crate::domain::entity::audit_event::AuditEvent;
use crate::domain::repository::AuditLogRepository;

/// Best effort: a failed write is logged and never fails the caller
pub(crate) async fn record<S>(store: &S, event: AuditEvent)
where
    S: AuditLogRepository,
{
    if let Err(e) = store.record_event(&event).await {
        tracing::warn!(action = %event.action, error = %e, "Audit event not recorded");
    }
}
