//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::session::AuthTokens;
use crate::domain::entity::user::{MergedIdentities, User};
use crate::domain::value_object::{identity::IdentityKind, ids::UserId, user_role::UserRole};

// ============================================================================
// Register / Login
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    /// Honored only when `ALLOW_AUTOVERIFY` is set
    #[serde(default)]
    pub autoverify: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

impl From<AuthTokens> for AuthResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: UserResponse::from(&tokens.user),
        }
    }
}

// ============================================================================
// Refresh / Logout
// ============================================================================

/// Body of `/refresh` and `/logout`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// ============================================================================
// Verification / Password reset
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAccountsRequest {
    pub source_user_id: UserId,
    pub destination_user_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAccountsResponse {
    pub message: String,
    pub destination_user_id: UserId,
    pub merged_identities: MergedIdentities,
}

// ============================================================================
// OAuth
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthStartQuery {
    pub redirect: Option<String>,
    pub frontend: Option<String>,
}

/// Form posted by the frontend to start linking; the access token travels
/// in the body because the browser navigates to this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthLinkForm {
    pub access_token: String,
    pub redirect: Option<String>,
    pub frontend: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// ============================================================================
// User
// ============================================================================

/// Public view of an account; never includes credentials
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub email: Option<String>,
    pub full_name: String,
    pub role: UserRole,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub linked_identities: Vec<IdentityKind>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id,
            email: user.primary_email().map(str::to_string),
            full_name: user.full_name.as_str().to_string(),
            role: user.role,
            email_verified: user.is_email_verified(),
            email_verified_at: user.email_verified_at,
            linked_identities: user.linked_identities(),
            created_at: user.created_at,
        }
    }
}
