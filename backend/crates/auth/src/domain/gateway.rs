//! Outbound Ports
//!
//! Collaborators outside the process: OpenID Connect providers and the
//! e-mail channel.

use crate::domain::value_object::identity::{OAuthProvider, ProviderProfile};
use crate::error::AuthResult;

/// Tokens returned by a provider's token endpoint
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub id_token: String,
}

#[trait_variant::make(IdentityProvider: Send)]
pub trait LocalIdentityProvider {
    fn provider(&self) -> OAuthProvider;

    /// Provider consent URL carrying the signed `state`
    fn authorization_url(&self, state: &str) -> AuthResult<String>;

    /// Fails `OAuthExchangeFailed` on transport errors, timeouts and
    /// non-2xx answers
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderTokens>;

    /// Fails `MalformedIdentityToken` on a bad shape and
    /// `IdentitySignatureInvalid` when verification is on and fails
    async fn resolve_identity(&self, tokens: &ProviderTokens) -> AuthResult<ProviderProfile>;
}

#[trait_variant::make(EmailSender: Send)]
pub trait LocalEmailSender {
    async fn send_verification(&self, to: &str, full_name: &str, token: &str) -> AuthResult<()>;

    async fn send_password_reset(&self, to: &str, full_name: &str, token: &str)
    -> AuthResult<()>;
}
