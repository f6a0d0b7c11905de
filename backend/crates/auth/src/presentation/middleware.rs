//! Auth Middleware
//!
//! `require_auth` validates the bearer access token and leaves an
//! [`AuthContext`] in the request extensions; handlers take it as an
//! extractor.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use platform::client::{ClientMeta, extract_bearer_token, extract_client_meta};

use crate::application::services::AuthServices;
use crate::domain::value_object::{ids::UserId, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Identity of the caller, taken from a valid access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: UserRole,
}

impl AuthContext {
    pub fn require_sysadmin(&self) -> AuthResult<()> {
        if self.role.is_sysadmin() {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id, role = self.role.code(), "Sysadmin route denied");
            Err(AuthError::Forbidden)
        }
    }
}

/// Middleware that requires a valid `Authorization: Bearer` access token
pub async fn require_auth(
    State(services): State<Arc<AuthServices>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_bearer_token(req.headers()).ok_or(AuthError::Unauthorized)?;
    let claims = services.tokens.verify_access(token)?;

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Missing only when a route forgot the middleware
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::Unauthorized)
    }
}

/// Client IP and user agent of the request
#[derive(Debug, Clone, Default)]
pub struct Client(pub ClientMeta);

impl<S> FromRequestParts<S> for Client
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(Client(extract_client_meta(&parts.headers, direct_ip)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_sysadmin() {
        let ctx = |role| AuthContext {
            user_id: UserId::new(),
            role,
        };
        assert!(ctx(UserRole::Sysadmin).require_sysadmin().is_ok());
        assert!(matches!(
            ctx(UserRole::Admin).require_sysadmin(),
            Err(AuthError::Forbidden)
        ));
        assert!(ctx(UserRole::Guest).require_sysadmin().is_err());
    }
}
