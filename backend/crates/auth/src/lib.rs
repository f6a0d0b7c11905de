//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository and provider traits
//! - `application/` - Configuration, token codecs and one use case per operation
//! - `infra/` - PostgreSQL and in-memory stores, OIDC client, e-mail senders
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Features
//! - Register / login with e-mail + password, e-mail verification
//! - JWT access tokens and rotating refresh tokens backed by server-side sessions
//! - Logout (one device or all), password reset
//! - Google and Microsoft sign-in, identity linking and unlinking
//! - Account merge for sysadmins
//!
//! ## Security Model
//! - Passwords hashed with Argon2id; only SHA-256 hashes of refresh and
//!   e-mail tokens are stored
//! - Access and refresh tokens signed with separate secrets and never
//!   accepted in each other's place
//! - Refresh tokens are single use; rotation is one conditional write
//! - Login and forgot-password answers do not reveal whether an account exists

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::maintenance::{PurgeReport, purge_expired};
pub use application::services::AuthServices;
pub use error::{AuthError, AuthResult};
pub use infra::postgres::PgAuthRepository;
pub use presentation::router::{auth_router, auth_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}
