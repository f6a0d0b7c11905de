//! OAuth State Codec
//!
//! The `state` parameter is an HS256 token signed with its own secret. It
//! carries a random nonce so two states are never equal, and it expires
//! five minutes after issue.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use serde::{Deserialize, Serialize};

use crate::application::config::OAuthConfig;
use crate::domain::entity::oauth_state::{OAuthMode, OAuthState};
use crate::domain::value_object::{identity::OAuthProvider, ids::UserId};
use crate::error::{AuthError, AuthResult};

const STATE_TYPE: &str = "oauth_state";

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    typ: String,
    nonce: String,
    provider: OAuthProvider,
    redirect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frontend: Option<String>,
    mode: OAuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_user_id: Option<UserId>,
    iat: i64,
    exp: i64,
}

pub struct OAuthStateCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl OAuthStateCodec {
    pub fn new(config: &OAuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(config.state_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.state_secret.as_bytes()),
            validation,
            ttl: config.state_ttl,
        }
    }

    pub fn encode(&self, state: &OAuthState) -> AuthResult<String> {
        let iat = Utc::now().timestamp();
        let claims = StateClaims {
            typ: STATE_TYPE.to_string(),
            nonce: platform::crypto::random_token(),
            provider: state.provider,
            redirect: state.redirect.clone(),
            frontend: state.frontend.clone(),
            mode: state.mode,
            current_user_id: state.current_user_id,
            iat,
            exp: iat.saturating_add(self.ttl.as_secs() as i64),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("OAuth state signing failed: {e}")))
    }

    pub fn decode(&self, token: &str) -> AuthResult<OAuthState> {
        let claims = decode::<StateClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => {
                    AuthError::InvalidOAuthState("OAuth state has expired")
                }
                _ => AuthError::InvalidOAuthState("Invalid OAuth state"),
            })?
            .claims;

        if claims.typ != STATE_TYPE {
            return Err(AuthError::InvalidOAuthState("Invalid OAuth state"));
        }
        // Link mode without an acting user (or the reverse) is never issued
        if (claims.mode == OAuthMode::Link) != claims.current_user_id.is_some() {
            return Err(AuthError::InvalidOAuthState("Invalid OAuth state"));
        }

        Ok(OAuthState {
            provider: claims.provider,
            redirect: claims.redirect,
            frontend: claims.frontend,
            mode: claims.mode,
            current_user_id: claims.current_user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> OAuthStateCodec {
        OAuthStateCodec::new(&OAuthConfig::default())
    }

    #[test]
    fn test_round_trip_login_and_link() {
        let codec = codec();
        let login = OAuthState::login(
            OAuthProvider::Google,
            "http://localhost:4000/auth-complete".into(),
            Some("next".into()),
        );
        assert_eq!(codec.decode(&codec.encode(&login).unwrap()).unwrap(), login);

        let link = OAuthState::link(
            OAuthProvider::Microsoft,
            "http://localhost:4000/profile".into(),
            None,
            UserId::new(),
        );
        assert_eq!(codec.decode(&codec.encode(&link).unwrap()).unwrap(), link);
    }

    #[test]
    fn test_states_are_unique() {
        let codec = codec();
        let state = OAuthState::login(OAuthProvider::Google, "http://localhost:4000".into(), None);
        assert_ne!(codec.encode(&state).unwrap(), codec.encode(&state).unwrap());
    }

    #[test]
    fn test_expired_state() {
        let mut config = OAuthConfig::default();
        config.state_ttl = Duration::ZERO;
        let codec = OAuthStateCodec::new(&config);
        let token = codec
            .encode(&OAuthState::login(
                OAuthProvider::Google,
                "http://localhost:4000".into(),
                None,
            ))
            .unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(matches!(
            codec.decode(&token),
            Err(AuthError::InvalidOAuthState("OAuth state has expired"))
        ));
    }

    #[test]
    fn test_foreign_or_garbage_state() {
        let token = codec()
            .encode(&OAuthState::login(
                OAuthProvider::Google,
                "http://localhost:4000".into(),
                None,
            ))
            .unwrap();
        assert!(matches!(
            codec().decode(&token),
            Err(AuthError::InvalidOAuthState("Invalid OAuth state"))
        ));
        assert!(codec().decode("garbage").is_err());
    }
}
