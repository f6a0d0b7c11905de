//! Token Codec
//!
//! HS256 JWTs in two independent contexts. Access and refresh tokens use
//! different secrets and carry a `type` claim, so a token minted in one
//! context never verifies in the other.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::application::config::{AuthConfig, SigningSecret};
use crate::domain::value_object::{
    ids::{RefreshSessionId, UserId},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: UserRole,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: UserId,
    #[serde(rename = "sessionId")]
    pub session_id: RefreshSessionId,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

struct SigningContext {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SigningContext {
    fn new(secret: &SigningSecret, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// `(iat, exp)` for a token minted now
    fn window(&self) -> (i64, i64) {
        let iat = Utc::now().timestamp();
        (iat, iat.saturating_add(self.ttl.as_secs() as i64))
    }

    fn sign<T: Serialize>(&self, claims: &T) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Token signing failed: {e}")))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        decode::<T>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .ok()
    }
}

pub struct TokenCodec {
    access: SigningContext,
    refresh: SigningContext,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: SigningContext::new(&config.access_token_secret, config.access_token_ttl),
            refresh: SigningContext::new(&config.refresh_token_secret, config.refresh_token_ttl),
        }
    }

    pub fn issue_access(
        &self,
        user_id: UserId,
        email: Option<&str>,
        role: UserRole,
    ) -> AuthResult<String> {
        let (iat, exp) = self.access.window();
        self.access.sign(&AccessTokenClaims {
            sub: user_id,
            email: email.map(str::to_string),
            role,
            token_type: TokenType::Access,
            iat,
            exp,
        })
    }

    pub fn issue_refresh(&self, user_id: UserId, session_id: RefreshSessionId) -> AuthResult<String> {
        let (iat, exp) = self.refresh.window();
        self.refresh.sign(&RefreshTokenClaims {
            sub: user_id,
            session_id,
            token_type: TokenType::Refresh,
            iat,
            exp,
        })
    }

    /// Fails `Unauthorized` on bad signature, shape, expiry or context
    pub fn verify_access(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.access
            .verify::<AccessTokenClaims>(token)
            .filter(|claims| claims.token_type == TokenType::Access)
            .ok_or(AuthError::Unauthorized)
    }

    /// Fails `InvalidRefreshToken` on bad signature, shape, expiry or context
    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshTokenClaims> {
        self.refresh
            .verify::<RefreshTokenClaims>(token)
            .filter(|claims| claims.token_type == TokenType::Refresh)
            .ok_or(AuthError::InvalidRefreshToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&AuthConfig::default())
    }

    #[test]
    fn test_access_round_trip() {
        let codec = codec();
        let user_id = UserId::new();
        let token = codec
            .issue_access(user_id, Some("a@x.com"), UserRole::Admin)
            .unwrap();

        let claims = codec.verify_access(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_round_trip() {
        let codec = codec();
        let user_id = UserId::new();
        let session_id = RefreshSessionId::new();
        let token = codec.issue_refresh(user_id, session_id).unwrap();

        let claims = codec.verify_refresh(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.session_id, session_id);
    }

    #[test]
    fn test_refresh_claims_use_camel_case_session_id() {
        let claims = RefreshTokenClaims {
            sub: UserId::new(),
            session_id: RefreshSessionId::new(),
            token_type: TokenType::Refresh,
            iat: 0,
            exp: 1,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("sessionId").is_some());
        assert_eq!(json["type"], "refresh");
    }

    #[test]
    fn test_cross_context_rejection() {
        let codec = codec();
        let user_id = UserId::new();
        let access = codec.issue_access(user_id, None, UserRole::Guest).unwrap();
        let refresh = codec.issue_refresh(user_id, RefreshSessionId::new()).unwrap();

        assert!(matches!(
            codec.verify_refresh(&access),
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            codec.verify_access(&refresh),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_type_claim_is_checked_even_with_shared_secret() {
        let mut config = AuthConfig::default();
        config.refresh_token_secret = config.access_token_secret.clone();
        let codec = TokenCodec::new(&config);

        let refresh = codec
            .issue_refresh(UserId::new(), RefreshSessionId::new())
            .unwrap();
        assert!(codec.verify_access(&refresh).is_err());
    }

    #[test]
    fn test_expired_and_tampered_tokens_fail() {
        let codec = codec();
        let expired = codec
            .access
            .sign(&AccessTokenClaims {
                sub: UserId::new(),
                email: None,
                role: UserRole::Guest,
                token_type: TokenType::Access,
                iat: 1_000,
                exp: 2_000,
            })
            .unwrap();
        assert!(codec.verify_access(&expired).is_err());

        let token = codec
            .issue_access(UserId::new(), None, UserRole::Guest)
            .unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(codec.verify_access(&tampered).is_err());
        assert!(codec.verify_access("not.a.jwt").is_err());
        assert!(codec.verify_access("").is_err());
    }

    #[test]
    fn test_other_secret_fails() {
        let token = codec()
            .issue_access(UserId::new(), None, UserRole::Guest)
            .unwrap();
        assert!(codec().verify_access(&token).is_err());
    }
}
