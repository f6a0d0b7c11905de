//! ID token decoding
//!
//! Structural decode (three segments, base64url JSON payload) and, when
//! enabled, RS256 verification against the provider's published JWKS.

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

pub type IdTokenClaims = Map<String, Value>;

/// Payload of a compact JWT without checking the signature
pub fn decode_unverified(token: &str) -> AuthResult<IdTokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(AuthError::MalformedIdentityToken);
    };

    let bytes = platform::crypto::from_base64url(payload)
        .map_err(|_| AuthError::MalformedIdentityToken)?;
    serde_json::from_slice::<IdTokenClaims>(&bytes).map_err(|_| AuthError::MalformedIdentityToken)
}

/// Verify signature, expiry and audience; `issuers` empty means unchecked
pub fn verify_with_jwks(
    token: &str,
    jwks: &JwkSet,
    audience: &str,
    issuers: &[&str],
) -> AuthResult<IdTokenClaims> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedIdentityToken)?;
    if header.alg != Algorithm::RS256 {
        return Err(AuthError::IdentitySignatureInvalid);
    }

    let jwk = header
        .kid
        .as_deref()
        .and_then(|kid| jwks.find(kid))
        .ok_or(AuthError::IdentitySignatureInvalid)?;
    let key = DecodingKey::from_jwk(jwk).map_err(|_| AuthError::IdentitySignatureInvalid)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    if !issuers.is_empty() {
        validation.set_issuer(issuers);
    }

    decode::<IdTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!(error = %e, "ID token verification failed");
            AuthError::IdentitySignatureInvalid
        })
}

pub fn string_claim<'a>(claims: &'a IdTokenClaims, name: &str) -> Option<&'a str> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
