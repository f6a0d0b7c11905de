//! OAuth Use Cases
//!
//! A flow goes `initiated` (state issued) -> code exchanged -> identity
//! resolved -> applied (login or link), or fails at any step. The callback
//! always knows where to send the browser, even on failure.

use std::sync::Arc;

use platform::client::ClientMeta;

use crate::application::audit;
use crate::application::services::{AuthServices, AuthStore, OAuthClient};
use crate::application::session::{AuthTokens, start_session};
use crate::domain::entity::{
    audit_event::{AuditAction, AuditEvent},
    oauth_state::{OAuthMode, OAuthState},
    user::User,
};
use crate::domain::value_object::{
    identity::{OAuthProvider, ProviderProfile},
    ids::UserId,
};
use crate::error::{AuthError, AuthResult};

/// Read-modify-write rounds before a `ConcurrentUpdate` reaches the caller
const USER_WRITE_ATTEMPTS: u32 = 3;

/// Configured provider clients, by provider
pub struct OAuthProviders<P> {
    pub google: Option<Arc<P>>,
    pub microsoft: Option<Arc<P>>,
}

impl<P> OAuthProviders<P> {
    pub fn none() -> Self {
        Self {
            google: None,
            microsoft: None,
        }
    }

    pub fn get(&self, provider: OAuthProvider) -> AuthResult<&P> {
        let client = match provider {
            OAuthProvider::Google => self.google.as_deref(),
            OAuthProvider::Microsoft => self.microsoft.as_deref(),
        };
        client.ok_or(AuthError::ProviderNotConfigured(provider.as_str()))
    }
}

impl<P> Clone for OAuthProviders<P> {
    fn clone(&self) -> Self {
        Self {
            google: self.google.clone(),
            microsoft: self.microsoft.clone(),
        }
    }
}

// ============================================================================
// Start (login / link)
// ============================================================================

pub struct OAuthStartUseCase<P>
where
    P: OAuthClient,
{
    providers: OAuthProviders<P>,
    services: Arc<AuthServices>,
}

impl<P> OAuthStartUseCase<P>
where
    P: OAuthClient,
{
    pub fn new(providers: OAuthProviders<P>, services: Arc<AuthServices>) -> Self {
        Self {
            providers,
            services,
        }
    }

    /// Provider consent URL for a login flow
    pub fn begin_login(
        &self,
        provider: OAuthProvider,
        redirect: Option<String>,
        frontend: Option<String>,
    ) -> AuthResult<String> {
        let redirect = self.checked_redirect(redirect)?;
        self.authorization_url(OAuthState::login(provider, redirect, frontend))
    }

    /// Provider consent URL for linking to the account behind `access_token`
    pub fn begin_link(
        &self,
        provider: OAuthProvider,
        access_token: &str,
        redirect: Option<String>,
        frontend: Option<String>,
    ) -> AuthResult<String> {
        let claims = self.services.tokens.verify_access(access_token)?;
        let redirect = self.checked_redirect(redirect)?;
        self.authorization_url(OAuthState::link(provider, redirect, frontend, claims.sub))
    }

    fn authorization_url(&self, state: OAuthState) -> AuthResult<String> {
        let client = self.providers.get(state.provider)?;
        let signed = self.services.oauth_state.encode(&state)?;
        tracing::debug!(provider = %state.provider, mode = ?state.mode, "OAuth flow initiated");
        client.authorization_url(&signed)
    }

    fn checked_redirect(&self, redirect: Option<String>) -> AuthResult<String> {
        let config = self.services.config();
        match redirect.filter(|r| !r.trim().is_empty()) {
            None => Ok(config.oauth.default_redirect.clone()),
            Some(target) if config.is_allowed_redirect(&target) => Ok(target),
            Some(target) => {
                tracing::warn!(redirect = %target, "OAuth redirect outside allowed origins");
                Err(AuthError::Validation("Redirect target is not allowed".to_string()))
            }
        }
    }
}

// ============================================================================
// Callback
// ============================================================================

/// Query parameters the provider sends back
#[derive(Debug, Default, Clone)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug)]
pub enum CallbackResult {
    LoggedIn(Box<AuthTokens>),
    Linked(OAuthProvider),
}

/// Where to send the browser and what to tell it
#[derive(Debug)]
pub struct CallbackOutcome {
    pub redirect: String,
    pub result: AuthResult<CallbackResult>,
}

pub struct OAuthCallbackUseCase<S, P>
where
    S: AuthStore,
    P: OAuthClient,
{
    store: Arc<S>,
    providers: OAuthProviders<P>,
    services: Arc<AuthServices>,
}

impl<S, P> OAuthCallbackUseCase<S, P>
where
    S: AuthStore,
    P: OAuthClient,
{
    pub fn new(store: Arc<S>, providers: OAuthProviders<P>, services: Arc<AuthServices>) -> Self {
        Self {
            store,
            providers,
            services,
        }
    }

    pub async fn execute(
        &self,
        provider: OAuthProvider,
        params: CallbackParams,
        client: ClientMeta,
    ) -> CallbackOutcome {
        let state = params
            .state
            .as_deref()
            .ok_or(AuthError::InvalidOAuthState("Invalid OAuth state"))
            .and_then(|raw| self.services.oauth_state.decode(raw));

        let state = match state {
            Ok(state) => state,
            Err(e) => {
                return CallbackOutcome {
                    redirect: self.services.config().oauth.default_redirect.clone(),
                    result: Err(e),
                };
            }
        };

        let result = self.complete(provider, &state, params, client).await;
        if let Err(e) = &result {
            tracing::warn!(provider = %provider, mode = ?state.mode, error = %e, "OAuth flow failed");
        }

        CallbackOutcome {
            redirect: state.redirect,
            result,
        }
    }

    async fn complete(
        &self,
        provider: OAuthProvider,
        state: &OAuthState,
        params: CallbackParams,
        client: ClientMeta,
    ) -> AuthResult<CallbackResult> {
        if state.provider != provider {
            return Err(AuthError::InvalidOAuthState("Invalid OAuth state"));
        }
        if let Some(error) = params.error {
            let detail = params.error_description.unwrap_or(error);
            return Err(AuthError::Validation(format!("Provider denied the request: {detail}")));
        }
        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Validation("Missing authorization code".to_string()))?;

        let provider_client = self.providers.get(provider)?;
        let tokens = provider_client.exchange_code(&code).await?;
        let profile = provider_client.resolve_identity(&tokens).await?;

        match (state.mode, state.current_user_id) {
            (OAuthMode::Login, _) => {
                let tokens = self.login(profile, client).await?;
                Ok(CallbackResult::LoggedIn(Box::new(tokens)))
            }
            (OAuthMode::Link, Some(user_id)) => {
                self.link(user_id, profile, &client).await?;
                Ok(CallbackResult::Linked(provider))
            }
            (OAuthMode::Link, None) => Err(AuthError::InvalidOAuthState("Invalid OAuth state")),
        }
    }

    /// Existing holder of the identity, or a fresh verified guest account
    async fn login(&self, profile: ProviderProfile, client: ClientMeta) -> AuthResult<AuthTokens> {
        let provider = profile.subject.provider();

        let holder = self
            .store
            .find_user_by_provider_subject(&profile.subject)
            .await?;

        let (user, action) = match holder {
            Some(mut user) => {
                self.refresh_email(&mut user, &profile, &client).await?;
                (user, AuditAction::OAuthLogin)
            }
            None => {
                let user = User::from_provider(&profile);
                match self.store.create_user(&user).await {
                    Ok(()) => {
                        tracing::info!(
                            user_id = %user.user_id,
                            provider = %provider,
                            "User created from OAuth login"
                        );
                        (user, AuditAction::OAuthRegister)
                    }
                    // Lost a race with a concurrent first login
                    Err(AuthError::AlreadyLinkedElsewhere) => {
                        let user = self
                            .store
                            .find_user_by_provider_subject(&profile.subject)
                            .await?
                            .ok_or(AuthError::AlreadyLinkedElsewhere)?;
                        (user, AuditAction::OAuthLogin)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let user_id = user.user_id;
        let event =
            AuditEvent::new(action, Some(user_id), &client).with("provider", provider.as_str());
        let tokens = start_session(self.store.as_ref(), &self.services, user, client).await?;
        audit::record(self.store.as_ref(), event).await;

        tracing::info!(user_id = %user_id, provider = %provider, "User logged in via OAuth");
        Ok(tokens)
    }

    /// Keep the stored provider e-mail current on a returning login
    async fn refresh_email(
        &self,
        user: &mut User,
        profile: &ProviderProfile,
        client: &ClientMeta,
    ) -> AuthResult<()> {
        if !user.refresh_provider_email(profile) {
            return Ok(());
        }
        match self.store.update_user(user).await {
            Ok(()) => {
                user.version += 1;
                let provider = profile.subject.provider();
                audit::record(
                    self.store.as_ref(),
                    AuditEvent::new(AuditAction::OAuthEmailUpdated, Some(user.user_id), client)
                        .with("provider", provider.as_str()),
                )
                .await;
                Ok(())
            }
            // Another write won; the e-mail is refreshed on the next login
            Err(AuthError::ConcurrentUpdate) => {
                tracing::debug!(user_id = %user.user_id, "Provider e-mail refresh skipped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn link(
        &self,
        user_id: UserId,
        profile: ProviderProfile,
        client: &ClientMeta,
    ) -> AuthResult<()> {
        let provider = profile.subject.provider();

        let mut attempt = 1;
        loop {
            let mut user = self
                .store
                .find_user_by_id(&user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?;

            if let Some(holder) = self
                .store
                .find_user_by_provider_subject(&profile.subject)
                .await?
            {
                if holder.user_id != user.user_id {
                    return Err(AuthError::AlreadyLinkedElsewhere);
                }
                tracing::debug!(user_id = %user_id, provider = %provider, "Already linked");
                return Ok(());
            }

            user.link(&profile);
            match self.store.update_user(&user).await {
                Ok(()) => break,
                Err(AuthError::ConcurrentUpdate) if attempt < USER_WRITE_ATTEMPTS => {
                    tracing::debug!(user_id = %user_id, attempt, "Account changed during link");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::IdentityLinked, Some(user_id), client)
                .with("provider", provider.as_str()),
        )
        .await;

        tracing::info!(user_id = %user_id, provider = %provider, "Identity linked");
        Ok(())
    }
}

// ============================================================================
// Unlink
// ============================================================================

pub struct UnlinkIdentityUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
}

impl<S> UnlinkIdentityUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        user_id: UserId,
        provider: OAuthProvider,
        client: ClientMeta,
    ) -> AuthResult<()> {
        let mut attempt = 1;
        loop {
            let mut user = self
                .store
                .find_user_by_id(&user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?;

            // Re-checked on every round against a fresh read
            user.unlink(provider.identity_kind())?;
            match self.store.update_user(&user).await {
                Ok(()) => break,
                Err(AuthError::ConcurrentUpdate) if attempt < USER_WRITE_ATTEMPTS => {
                    tracing::debug!(user_id = %user_id, attempt, "Account changed during unlink");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        audit::record(
            self.store.as_ref(),
            AuditEvent::new(AuditAction::IdentityUnlinked, Some(user_id), &client)
                .with("provider", provider.as_str()),
        )
        .await;

        tracing::info!(user_id = %user_id, provider = %provider, "Identity unlinked");
        Ok(())
    }
}
