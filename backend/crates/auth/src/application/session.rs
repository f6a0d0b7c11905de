//! Session Issuance
//!
//! Every successful login path (password, refresh, OAuth) ends here: a new
//! refresh session row plus an access/refresh token pair.

use platform::client::ClientMeta;
use platform::crypto::sha256_hex;

use crate::application::services::AuthServices;
use crate::domain::entity::{refresh_session::RefreshSession, user::User};
use crate::domain::repository::RefreshSessionRepository;
use crate::domain::value_object::ids::RefreshSessionId;
use crate::error::AuthResult;

/// Tokens handed to the client after a successful authentication
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// A session row and the raw refresh token it was built from
pub(crate) struct MintedSession {
    pub session: RefreshSession,
    pub refresh_token: String,
}

/// Sign a refresh token for a fresh session id; nothing is stored yet.
pub(crate) fn mint_session(
    services: &AuthServices,
    user: &User,
    client: ClientMeta,
) -> AuthResult<MintedSession> {
    let session_id = RefreshSessionId::new();
    let refresh_token = services.tokens.issue_refresh(user.user_id, session_id)?;
    let session = RefreshSession::new(
        session_id,
        user.user_id,
        sha256_hex(&refresh_token),
        client,
        services.config.refresh_ttl(),
    );
    Ok(MintedSession {
        session,
        refresh_token,
    })
}

pub(crate) fn access_token_for(services: &AuthServices, user: &User) -> AuthResult<String> {
    services
        .tokens
        .issue_access(user.user_id, user.primary_email(), user.role)
}

/// Store a new session for `user` and return both tokens
pub(crate) async fn start_session<S>(
    store: &S,
    services: &AuthServices,
    user: User,
    client: ClientMeta,
) -> AuthResult<AuthTokens>
where
    S: RefreshSessionRepository,
{
    let minted = mint_session(services, &user, client)?;
    store.create_session(&minted.session).await?;

    tracing::debug!(
        user_id = %user.user_id,
        session_id = %minted.session.session_id,
        "Refresh session created"
    );

    Ok(AuthTokens {
        access_token: access_token_for(services, &user)?,
        refresh_token: minted.refresh_token,
        user,
    })
}
