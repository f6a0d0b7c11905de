//! Application Configuration
//!
//! Built once at startup and shared by `Arc`. Invalid values fail here,
//! never at request time.

use std::fmt;
use std::time::Duration;

use platform::config::{
    ConfigError, MAX_TTL, env_flag, env_list, env_opt, env_or, env_ttl, env_u64,
};
use platform::crypto::random_bytes;

/// HMAC key material; Debug never prints it
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn random() -> Self {
        Self(random_bytes(32))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret([REDACTED; {}])", self.0.len())
    }
}

#[derive(Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub state_secret: SigningSecret,
    /// Lifetime of the signed state (5 minutes)
    pub state_ttl: Duration,
    /// Used when the callback cannot read the state
    pub default_redirect: String,
    pub google: Option<ProviderCredentials>,
    pub microsoft: Option<ProviderCredentials>,
    pub http_timeout: Duration,
    pub verify_id_token_signature: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            state_secret: SigningSecret::random(),
            state_ttl: Duration::from_secs(5 * 60),
            default_redirect: "http://localhost:4000/auth-complete".to_string(),
            google: None,
            microsoft: None,
            http_timeout: Duration::from_secs(10),
            verify_id_token_signature: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token_secret: SigningSecret,
    pub refresh_token_secret: SigningSecret,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub email_verification_ttl: Duration,
    pub password_reset_ttl: Duration,
    /// Block password login until the e-mail is verified
    pub require_verified_email: bool,
    /// Honor the `autoverify` flag on register (tests, local runs)
    pub allow_autoverify: bool,
    /// Public base URL of this API (OAuth callback URIs)
    pub api_url: String,
    /// Base URL for links in e-mails
    pub frontend_url: String,
    /// CORS origins; OAuth redirect targets must start with one of them
    pub allowed_origins: Vec<String>,
    pub oauth: OAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: SigningSecret::random(),
            refresh_token_secret: SigningSecret::random(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            email_verification_ttl: Duration::from_secs(24 * 3600),
            password_reset_ttl: Duration::from_secs(3600),
            require_verified_email: true,
            allow_autoverify: false,
            api_url: "http://localhost:31113".to_string(),
            frontend_url: "http://localhost:4000".to_string(),
            allowed_origins: vec!["http://localhost:4000".to_string()],
            oauth: OAuthConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Random secrets, autoverify allowed
    pub fn development() -> Self {
        Self {
            allow_autoverify: true,
            ..Default::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let google = provider_credentials("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET")?;
        let microsoft = provider_credentials("MICROSOFT_CLIENT_ID", "MICROSOFT_CLIENT_SECRET")?;
        let any_provider = google.is_some() || microsoft.is_some();

        let access_token_secret = secret("JWT_ACCESS_SECRET", true)?;
        let refresh_token_secret = secret("JWT_REFRESH_SECRET", true)?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::Invalid {
                name: "JWT_REFRESH_SECRET".to_string(),
                reason: "must differ from JWT_ACCESS_SECRET".to_string(),
            });
        }

        let config = Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl: env_ttl("JWT_ACCESS_EXPIRY", "15m")?,
            refresh_token_ttl: env_ttl("JWT_REFRESH_EXPIRY", "7d")?,
            email_verification_ttl: env_ttl("EMAIL_VERIFICATION_EXPIRY", "24h")?,
            password_reset_ttl: env_ttl("PASSWORD_RESET_EXPIRY", "1h")?,
            require_verified_email: env_flag("REQUIRE_VERIFIED_EMAIL", true)?,
            allow_autoverify: env_flag("ALLOW_AUTOVERIFY", false)?,
            api_url: trim_base(env_or("API_URL", "http://localhost:31113")),
            frontend_url: trim_base(env_or("FRONTEND_URL", "http://localhost:4000")),
            allowed_origins: env_list("CORS_ALLOWED_ORIGINS", "http://localhost:4000"),
            oauth: OAuthConfig {
                state_secret: secret("OAUTH_STATE_SECRET", any_provider)?,
                state_ttl: Duration::from_secs(5 * 60),
                default_redirect: env_or(
                    "OAUTH_DEFAULT_REDIRECT",
                    "http://localhost:4000/auth-complete",
                ),
                google,
                microsoft,
                http_timeout: Duration::from_secs(env_u64("OAUTH_HTTP_TIMEOUT_SECS", 10)?),
                verify_id_token_signature: env_flag("OAUTH_VERIFY_ID_TOKEN_SIGNATURE", true)?,
            },
        };

        tracing::info!(
            access_ttl_secs = config.access_token_ttl.as_secs(),
            refresh_ttl_secs = config.refresh_token_ttl.as_secs(),
            require_verified_email = config.require_verified_email,
            google = config.oauth.google.is_some(),
            microsoft = config.oauth.microsoft.is_some(),
            "Auth configuration loaded"
        );

        Ok(config)
    }

    /// Whether `target` is under one of the allowed origins
    pub fn is_allowed_redirect(&self, target: &str) -> bool {
        self.allowed_origins.iter().any(|origin| {
            target == origin
                || target
                    .strip_prefix(origin.as_str())
                    .is_some_and(|rest| rest.starts_with(['/', '?', '#']))
        })
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        to_chrono(self.access_token_ttl)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        to_chrono(self.refresh_token_ttl)
    }
}

/// Clamped to `MAX_TTL` so `now + ttl` stays representable
pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration.min(MAX_TTL)).unwrap_or(chrono::TimeDelta::zero())
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Required secrets fall back to random ones only in debug builds.
fn secret(name: &str, required: bool) -> Result<SigningSecret, ConfigError> {
    match env_opt(name) {
        Some(value) => Ok(SigningSecret::new(value.into_bytes())),
        None if required && !cfg!(debug_assertions) => Err(ConfigError::Missing(name.to_string())),
        None => {
            if required {
                tracing::warn!(variable = name, "Secret not set, using a random one");
            }
            Ok(SigningSecret::random())
        }
    }
}

fn provider_credentials(
    id_var: &str,
    secret_var: &str,
) -> Result<Option<ProviderCredentials>, ConfigError> {
    match (env_opt(id_var), env_opt(secret_var)) {
        (Some(client_id), Some(client_secret)) => Ok(Some(ProviderCredentials {
            client_id,
            client_secret,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Missing(secret_var.to_string())),
        (None, Some(_)) => Err(ConfigError::Missing(id_var.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.access_token_ttl, Duration::from_secs(900));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(604_800));
        assert_eq!(config.oauth.state_ttl, Duration::from_secs(300));
        assert!(config.require_verified_email);
        assert_ne!(config.access_token_secret, config.refresh_token_secret);
    }

    #[test]
    fn test_oversized_ttl_is_clamped() {
        let ttl = to_chrono(Duration::from_secs(u64::MAX));
        assert_eq!(ttl, chrono::Duration::days(3650));
        assert!(chrono::Utc::now().checked_add_signed(ttl).is_some());
    }

    #[test]
    fn test_redirect_allow_list() {
        let config = AuthConfig::default();
        assert!(config.is_allowed_redirect("http://localhost:4000"));
        assert!(config.is_allowed_redirect("http://localhost:4000/auth-complete"));
        assert!(!config.is_allowed_redirect("http://localhost:40000/x"));
        assert!(!config.is_allowed_redirect("http://localhost:4000.evil.com/x"));
        assert!(!config.is_allowed_redirect("https://evil.com"));
    }

    #[test]
    fn test_secrets_are_redacted() {
        let config = AuthConfig::default();
        let debug = format!("{config:?}");
        assert!(debug.contains("REDACTED"));
    }
}
