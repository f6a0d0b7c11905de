//! Application Layer
//!
//! Configuration, codecs and one use case per orchestrator operation.

pub mod audit;
pub mod change_password;
pub mod config;
pub mod email_verification;
pub mod ephemeral;
pub mod login;
pub mod logout;
pub mod maintenance;
pub mod merge_accounts;
pub mod oauth;
pub mod oauth_state;
pub mod password_reset;
pub mod refresh;
pub mod register;
pub mod services;
pub mod session;
pub mod token_codec;

// Re-exports
pub use change_password::{ChangePasswordInput, ChangePasswordUseCase};
pub use config::AuthConfig;
pub use email_verification::{ResendVerificationUseCase, VerifyEmailUseCase};
pub use login::{LoginInput, LoginUseCase};
pub use logout::LogoutUseCase;
pub use maintenance::{PurgeReport, purge_expired};
pub use merge_accounts::MergeAccountsUseCase;
pub use oauth::{
    CallbackOutcome, CallbackParams, CallbackResult, OAuthCallbackUseCase, OAuthProviders,
    OAuthStartUseCase, UnlinkIdentityUseCase,
};
pub use password_reset::{RequestPasswordResetUseCase, ResetPasswordInput, ResetPasswordUseCase};
pub use refresh::RefreshUseCase;
pub use register::{RegisterInput, RegisterOutput, RegisterUseCase};
pub use services::{AuthServices, AuthStore, Mailer, OAuthClient};
pub use session::AuthTokens;
pub use token_codec::{AccessTokenClaims, RefreshTokenClaims, TokenCodec};
