//! Domain Layer
//!
//! Contains entities, value objects, repository traits and outbound ports.

pub mod entity;
pub mod gateway;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    audit_event::AuditEvent, ephemeral_token::EphemeralToken, oauth_state::OAuthState,
    refresh_session::RefreshSession, user::User,
};
pub use gateway::{EmailSender, IdentityProvider, ProviderTokens};
pub use repository::{
    AuditLogRepository, EphemeralTokenRepository, RefreshSessionRepository, UserRepository,
};
