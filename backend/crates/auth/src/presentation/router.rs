//! Auth Router

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::application::config::AuthConfig;
use crate::application::oauth::OAuthProviders;
use crate::application::services::{AuthServices, AuthStore, Mailer, OAuthClient};
use crate::error::AuthResult;
use crate::infra::{LoggingEmailSender, OidcProvider, PgAuthRepository, providers_from_config};
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::require_auth;

/// Production router: PostgreSQL, logged e-mails, real OIDC providers
pub fn auth_router(repo: PgAuthRepository, config: AuthConfig) -> AuthResult<Router> {
    let providers = providers_from_config(&config)?;
    let mailer = LoggingEmailSender::new(config.frontend_url.clone());
    let services = Arc::new(AuthServices::new(Arc::new(config))?);

    Ok(auth_router_generic::<PgAuthRepository, LoggingEmailSender, OidcProvider>(
        AuthAppState::new(Arc::new(repo), Arc::new(mailer), providers, services),
    ))
}

/// Router over any store, mailer and provider implementation
pub fn auth_router_generic<S, M, P>(state: AuthAppState<S, M, P>) -> Router
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    let protected = Router::new()
        .route("/auth/logout-all", post(handlers::logout_all::<S, M, P>))
        .route(
            "/auth/resend-verification",
            post(handlers::resend_verification::<S, M, P>),
        )
        .route("/auth/password", patch(handlers::change_password::<S, M, P>))
        .route(
            "/oauth/{provider}/unlink",
            post(handlers::oauth_unlink::<S, M, P>),
        )
        .route(
            "/admin/merge-accounts",
            patch(handlers::merge_accounts::<S, M, P>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.services.clone(),
            require_auth,
        ));

    Router::new()
        .route("/auth/register", post(handlers::register::<S, M, P>))
        .route("/auth/login", post(handlers::login::<S, M, P>))
        .route("/auth/refresh", post(handlers::refresh::<S, M, P>))
        .route("/auth/logout", post(handlers::logout::<S, M, P>))
        .route("/auth/verify-email", post(handlers::verify_email::<S, M, P>))
        .route(
            "/auth/forgot-password",
            post(handlers::forgot_password::<S, M, P>),
        )
        .route(
            "/auth/reset-password",
            post(handlers::reset_password::<S, M, P>),
        )
        .route("/oauth/{provider}/login", get(handlers::oauth_login::<S, M, P>))
        .route("/oauth/{provider}/link", post(handlers::oauth_link::<S, M, P>))
        .route(
            "/oauth/{provider}/callback",
            get(handlers::oauth_callback::<S, M, P>),
        )
        .merge(protected)
        .with_state(state)
}

/// Router without any OAuth provider configured
pub fn auth_router_without_oauth<S, M>(
    store: Arc<S>,
    mailer: Arc<M>,
    services: Arc<AuthServices>,
) -> Router
where
    S: AuthStore,
    M: Mailer,
{
    auth_router_generic::<S, M, OidcProvider>(AuthAppState::new(
        store,
        mailer,
        OAuthProviders::none(),
        services,
    ))
}
