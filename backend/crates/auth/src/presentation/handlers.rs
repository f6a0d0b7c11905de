//! HTTP Handlers

use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::oauth::{CallbackParams, CallbackResult, OAuthProviders};
use crate::application::services::{AuthServices, AuthStore, Mailer, OAuthClient};
use crate::application::{
    ChangePasswordInput, ChangePasswordUseCase, LoginInput, LoginUseCase, LogoutUseCase, MergeAccountsUseCase, OAuthCallbackUseCase,
    OAuthStartUseCase, RefreshUseCase, RegisterInput, RegisterUseCase, RequestPasswordResetUseCase,
    ResendVerificationUseCase, ResetPasswordInput, ResetPasswordUseCase, UnlinkIdentityUseCase,
    VerifyEmailUseCase,
};
use crate::domain::value_object::identity::OAuthProvider;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    AuthResponse, CallbackQuery, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MergeAccountsRequest,
    MergeAccountsResponse, MessageResponse, OAuthLinkForm, OAuthStartQuery, RefreshRequest,
    RegisterRequest, RegisterResponse, ResetPasswordRequest, UserResponse, VerifyEmailRequest,
};
use crate::presentation::middleware::{AuthContext, Client};

/// Shared state for auth handlers
pub struct AuthAppState<S, M, P> {
    pub store: Arc<S>,
    pub mailer: Arc<M>,
    pub providers: OAuthProviders<P>,
    pub services: Arc<AuthServices>,
}

impl<S, M, P> AuthAppState<S, M, P> {
    pub fn new(
        store: Arc<S>,
        mailer: Arc<M>,
        providers: OAuthProviders<P>,
        services: Arc<AuthServices>,
    ) -> Self {
        Self {
            store,
            mailer,
            providers,
            services,
        }
    }
}

// derive(Clone) would demand S: Clone etc.
impl<S, M, P> Clone for AuthAppState<S, M, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            mailer: self.mailer.clone(),
            providers: self.providers.clone(),
            services: self.services.clone(),
        }
    }
}

// ============================================================================
// Register / Login / Refresh / Logout
// ============================================================================

/// POST /auth/register
pub async fn register<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Client(client): Client,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    let use_case = RegisterUseCase::new(
        state.store.clone(),
        state.mailer.clone(),
        state.services.clone(),
    );

    let output = use_case
        .execute(
            RegisterInput {
                email: req.email,
                password: req.password,
                full_name: req.full_name,
                autoverify: req.autoverify,
            },
            client,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(&output.user),
        }),
    ))
}

/// POST /auth/login
pub async fn login<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Client(client): Client,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<AuthResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    let use_case = LoginUseCase::new(state.store.clone(), state.services.clone());
    let input = LoginInput {
        email: req.email,
        password: req.password,
    };
    let tokens = use_case.execute(input, client).await?;
    Ok(Json(tokens.into()))
}

/// POST /auth/refresh
pub async fn refresh<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Client(client): Client,
    Json(req): Json<RefreshRequest>,
) -> AuthResult<Json<AuthResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    let use_case = RefreshUseCase::new(state.store.clone(), state.services.clone());
    let tokens = use_case.execute(&req.refresh_token, client).await?;
    Ok(Json(tokens.into()))
}

/// POST /auth/logout
///
/// 204 even when the token is unknown or already revoked.
pub async fn logout<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Client(client): Client,
    Json(req): Json<RefreshRequest>,
) -> AuthResult<StatusCode>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    LogoutUseCase::new(state.store.clone())
        .execute(&req.refresh_token, client)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/logout-all (bearer)
pub async fn logout_all<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    ctx: AuthContext,
    Client(client): Client,
) -> AuthResult<Json<MessageResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    LogoutUseCase::new(state.store.clone())
        .execute_all(ctx.user_id, client)
        .await?;
    Ok(Json(MessageResponse::new("Logged out from all devices")))
}

// ============================================================================
// Email verification / Password reset
// ============================================================================

/// POST /auth/verify-email
pub async fn verify_email<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Client(client): Client,
    Json(req): Json<VerifyEmailRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    VerifyEmailUseCase::new(state.store.clone())
        .execute(&req.token, client)
        .await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// POST /auth/resend-verification (bearer)
pub async fn resend_verification<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    ctx: AuthContext,
) -> AuthResult<Json<MessageResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    ResendVerificationUseCase::new(
        state.store.clone(),
        state.mailer.clone(),
        state.services.clone(),
    )
    .execute(ctx.user_id)
    .await?;
    Ok(Json(MessageResponse::new("Verification email sent")))
}

/// POST /auth/forgot-password
pub async fn forgot_password<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    RequestPasswordResetUseCase::new(
        state.store.clone(),
        state.mailer.clone(),
        state.services.clone(),
    )
    .execute(&req.email)
    .await?;
    Ok(Json(MessageResponse::new(
        "If an account exists for this email, a password reset link has been sent",
    )))
}

/// POST /auth/reset-password
pub async fn reset_password<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Client(client): Client,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    ResetPasswordUseCase::new(state.store.clone(), state.services.clone())
        .execute(
            ResetPasswordInput {
                token: req.token,
                new_password: req.new_password,
            },
            client,
        )
        .await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

/// PATCH /auth/password (bearer)
///
/// Signs out every device, the calling one included.
pub async fn change_password<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    ctx: AuthContext,
    Client(client): Client,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    ChangePasswordUseCase::new(state.store.clone(), state.services.clone())
        .execute(
            ctx.user_id,
            ChangePasswordInput {
                current_password: req.current_password,
                new_password: req.new_password,
            },
            client,
        )
        .await?;
    Ok(Json(MessageResponse::new(
        "Password changed successfully, please log in again",
    )))
}

// ============================================================================
// OAuth
// ============================================================================

/// GET /oauth/{provider}/login
pub async fn oauth_login<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthStartQuery>,
) -> AuthResult<Response>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    let provider: OAuthProvider = provider.parse()?;
    let url = OAuthStartUseCase::new(state.providers.clone(), state.services.clone())
        .begin_login(provider, query.redirect, query.frontend)?;
    Ok(found(url))
}

/// POST /oauth/{provider}/link
pub async fn oauth_link<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Path(provider): Path<String>,
    Form(form): Form<OAuthLinkForm>,
) -> AuthResult<Response>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    let provider: OAuthProvider = provider.parse()?;
    let url = OAuthStartUseCase::new(state.providers.clone(), state.services.clone())
        .begin_link(provider, &form.access_token, form.redirect, form.frontend)?;
    Ok(found(url))
}

/// GET /oauth/{provider}/callback
///
/// Always answers with a redirect; the outcome travels in the fragment.
pub async fn oauth_callback<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Path(provider): Path<String>,
    Client(client): Client,
    Query(query): Query<CallbackQuery>,
) -> Response
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    let provider = match provider.parse::<OAuthProvider>() {
        Ok(provider) => provider,
        Err(e) => {
            let fallback = &state.services.config().oauth.default_redirect;
            return found(error_fragment(fallback, &e));
        }
    };

    let use_case = OAuthCallbackUseCase::new(
        state.store.clone(),
        state.providers.clone(),
        state.services.clone(),
    );
    let params = CallbackParams {
        code: query.code,
        state: query.state,
        error: query.error,
        error_description: query.error_description,
    };
    let outcome = use_case.execute(provider, params, client).await;

    let location = match outcome.result {
        Ok(CallbackResult::LoggedIn(tokens)) => format!(
            "{}#access_token={}&refresh_token={}",
            outcome.redirect,
            encode(&tokens.access_token),
            encode(&tokens.refresh_token)
        ),
        Ok(CallbackResult::Linked(provider)) => {
            format!("{}#status=linked&provider={provider}", outcome.redirect)
        }
        Err(e) => error_fragment(&outcome.redirect, &e),
    };
    found(location)
}

/// POST /oauth/{provider}/unlink (bearer)
pub async fn oauth_unlink<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    Path(provider): Path<String>,
    ctx: AuthContext,
    Client(client): Client,
) -> AuthResult<StatusCode>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    let provider: OAuthProvider = provider.parse()?;
    UnlinkIdentityUseCase::new(state.store.clone())
        .execute(ctx.user_id, provider, client)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn error_fragment(redirect: &str, err: &AuthError) -> String {
    err.log();
    format!(
        "{redirect}#error={}&message={}",
        err.status_code().as_u16(),
        encode(&err.public_message())
    )
}

// ============================================================================
// Admin
// ============================================================================

/// PATCH /admin/merge-accounts (sysadmin)
pub async fn merge_accounts<S, M, P>(
    State(state): State<AuthAppState<S, M, P>>,
    ctx: AuthContext,
    Client(client): Client,
    Json(req): Json<MergeAccountsRequest>,
) -> AuthResult<Json<MergeAccountsResponse>>
where
    S: AuthStore,
    M: Mailer,
    P: OAuthClient,
{
    ctx.require_sysadmin()?;

    let merged = MergeAccountsUseCase::new(state.store.clone())
        .execute(
            req.source_user_id,
            req.destination_user_id,
            ctx.user_id,
            client,
        )
        .await?;

    Ok(Json(MergeAccountsResponse {
        message: "Accounts merged successfully".to_string(),
        destination_user_id: req.destination_user_id,
        merged_identities: merged,
    }))
}
