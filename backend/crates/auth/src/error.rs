//! Auth Error Types
//!
//! Auth-specific failures that integrate with the unified
//! `kernel::error::AppError` system. Every variant maps to one HTTP status and
//! one stable machine-readable code; internal causes are logged, never echoed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

use crate::domain::value_object::identity::IdentityKind;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input rejected at the boundary
    #[error("{0}")]
    Validation(String),

    #[error("Password does not meet the strength requirements")]
    WeakPassword(Vec<String>),

    /// Same error for unknown user and wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email address before logging in")]
    EmailNotVerified,

    /// Missing or invalid access token
    #[error("Authentication required")]
    Unauthorized,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("User not found")]
    UserNotFound,

    #[error("An account with this email already exists")]
    EmailInUse,

    #[error("This account is already linked to another user")]
    AlreadyLinkedElsewhere,

    #[error("Identity is not linked to this account")]
    IdentityNotLinked,

    /// Verification / password reset token unknown, used or expired
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    /// Refresh token not found, expired or revoked (never says which)
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("{0}")]
    InvalidOAuthState(&'static str),

    #[error("Failed to exchange authorization code with the provider")]
    OAuthExchangeFailed,

    #[error("Malformed identity token")]
    MalformedIdentityToken,

    #[error("Identity token signature could not be verified")]
    IdentitySignatureInvalid,

    #[error("OAuth provider {0} is not configured")]
    ProviderNotConfigured(&'static str),

    #[error("Cannot remove the last linked identity")]
    LastIdentity,

    #[error("Destination account already has identities of the same kind: {}", format_kinds(.0))]
    ConflictingIdentity(Vec<IdentityKind>),

    #[error("Source and destination accounts are the same")]
    SameAccount,

    /// A conditional user write found a newer row than the one it read
    #[error("The account was changed by another request, please retry")]
    ConcurrentUpdate,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_kinds(kinds: &[IdentityKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> ErrorKind {
        use AuthError::*;
        match self {
            Validation(_)
            | WeakPassword(_)
            | InvalidOrExpiredToken
            | InvalidOAuthState(_)
            | MalformedIdentityToken
            | IdentitySignatureInvalid
            | LastIdentity
            | SameAccount => ErrorKind::BadRequest,
            InvalidCredentials | Unauthorized | InvalidRefreshToken => ErrorKind::Unauthorized,
            EmailNotVerified | Forbidden => ErrorKind::Forbidden,
            UserNotFound | IdentityNotLinked => ErrorKind::NotFound,
            EmailInUse | AlreadyLinkedElsewhere | ConflictingIdentity(_) | ConcurrentUpdate => {
                ErrorKind::Conflict
            }
            OAuthExchangeFailed => ErrorKind::BadGateway,
            ProviderNotConfigured(_) => ErrorKind::ServiceUnavailable,
            Database(_) | Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        use AuthError::*;
        match self {
            Validation(_) => "VALIDATION_ERROR",
            WeakPassword(_) => "WEAK_PASSWORD",
            InvalidCredentials => "INVALID_CREDENTIALS",
            EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Unauthorized => "UNAUTHORIZED",
            Forbidden => "FORBIDDEN",
            UserNotFound => "USER_NOT_FOUND",
            EmailInUse => "EMAIL_IN_USE",
            AlreadyLinkedElsewhere => "ALREADY_LINKED_ELSEWHERE",
            IdentityNotLinked => "IDENTITY_NOT_LINKED",
            InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            InvalidOAuthState(_) => "INVALID_OAUTH_STATE",
            OAuthExchangeFailed => "OAUTH_EXCHANGE_FAILED",
            MalformedIdentityToken => "MALFORMED_IDENTITY_TOKEN",
            IdentitySignatureInvalid => "IDENTITY_SIGNATURE_INVALID",
            ProviderNotConfigured(_) => "PROVIDER_NOT_CONFIGURED",
            LastIdentity => "LAST_IDENTITY",
            ConflictingIdentity(_) => "CONFLICTING_IDENTITY",
            SameAccount => "SAME_ACCOUNT",
            ConcurrentUpdate => "CONCURRENT_UPDATE",
            Database(_) | Internal(_) => "INTERNAL",
        }
    }

    /// Client-facing message; server-side details stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Database(_) | AuthError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_app_error(&self) -> AppError {
        let err = AppError::new(self.kind(), self.public_message()).with_code(self.code());
        match self {
            AuthError::WeakPassword(errors) => err.with_errors(errors.clone()),
            AuthError::ConflictingIdentity(kinds) => {
                err.with_errors(kinds.iter().map(|k| k.as_str().to_string()).collect())
            }
            AuthError::EmailNotVerified => {
                err.with_action("Check your inbox for the verification link")
            }
            _ => err,
        }
    }

    pub(crate) fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::OAuthExchangeFailed
            | AuthError::IdentitySignatureInvalid
            | AuthError::ProviderNotConfigured(_) => {
                tracing::error!(error = %self, "OAuth provider failure");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::InvalidRefreshToken => {
                tracing::warn!("Rejected refresh token (unknown, expired, revoked or reused)");
            }
            AuthError::InvalidOAuthState(reason) => {
                tracing::warn!(reason, "Rejected OAuth state");
            }
            AuthError::MalformedIdentityToken => {
                tracing::warn!("Malformed identity token from provider");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

/// Value objects validate with `AppError`; client mistakes stay client errors.
impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        if err.kind().is_client_error() {
            AuthError::Validation(err.message().to_string())
        } else {
            AuthError::Internal(err.to_string())
        }
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::Validation("x".into()), 400),
            (AuthError::WeakPassword(vec![]), 400),
            (AuthError::InvalidCredentials, 401),
            (AuthError::EmailNotVerified, 403),
            (AuthError::Unauthorized, 401),
            (AuthError::Forbidden, 403),
            (AuthError::UserNotFound, 404),
            (AuthError::EmailInUse, 409),
            (AuthError::AlreadyLinkedElsewhere, 409),
            (AuthError::IdentityNotLinked, 404),
            (AuthError::InvalidOrExpiredToken, 400),
            (AuthError::InvalidRefreshToken, 401),
            (AuthError::InvalidOAuthState("Invalid OAuth state"), 400),
            (AuthError::OAuthExchangeFailed, 502),
            (AuthError::MalformedIdentityToken, 400),
            (AuthError::IdentitySignatureInvalid, 400),
            (AuthError::ProviderNotConfigured("google"), 503),
            (AuthError::LastIdentity, 400),
            (AuthError::ConflictingIdentity(vec![IdentityKind::Google]), 409),
            (AuthError::SameAccount, 400),
            (AuthError::ConcurrentUpdate, 409),
            (AuthError::Internal("boom".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err:?}");
        }
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = AuthError::Internal("connection string postgres://secret".into());
        let app = err.to_app_error();
        assert!(!app.message().contains("secret"));
        assert_eq!(app.code(), "INTERNAL");
    }

    #[test]
    fn test_conflicting_identity_lists_kinds() {
        let err = AuthError::ConflictingIdentity(vec![IdentityKind::Local, IdentityKind::Google]);
        assert!(err.to_string().ends_with("local, google"));
        assert_eq!(err.to_app_error().errors(), ["local", "google"]);
    }

    #[test]
    fn test_app_error_conversion_keeps_client_errors() {
        let err: AuthError = AppError::bad_request("Invalid email format").into();
        assert!(matches!(err, AuthError::Validation(ref m) if m == "Invalid email format"));

        let err: AuthError = AppError::internal("db down").into();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
