//! Ephemeral token issuing shared by verification and password reset

use chrono::Duration;
use platform::crypto::{random_token, sha256_hex};

use crate::domain::entity::ephemeral_token::{EphemeralToken, EphemeralTokenKind};
use crate::domain::repository::EphemeralTokenRepository;
use crate::domain::value_object::ids::UserId;
use crate::error::AuthResult;

/// Returns the raw token; only its hash is stored. Earlier unused tokens of
/// the same kind stop working.
pub(crate) async fn issue_ephemeral<S>(
    store: &S,
    user_id: UserId,
    kind: EphemeralTokenKind,
    ttl: Duration,
) -> AuthResult<String>
where
    S: EphemeralTokenRepository,
{
    let raw = random_token();
    let token = EphemeralToken::new(user_id, kind, sha256_hex(&raw), ttl);
    store.replace_token(&token).await?;
    tracing::debug!(user_id = %user_id, kind = %kind, "Ephemeral token issued");
    Ok(raw)
}
