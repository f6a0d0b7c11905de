//! OpenID Connect provider client (Google, Microsoft)
//!
//! Authorization-code flow over `reqwest`. Every outbound call shares the
//! client-wide timeout; a timeout or provider outage surfaces as
//! `OAuthExchangeFailed`, a token that does not verify as
//! `IdentitySignatureInvalid`.

pub mod id_token;

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::decode_header;
use jsonwebtoken::jwk::JwkSet;
use reqwest::Client;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::application::config::{AuthConfig, ProviderCredentials};
use crate::application::oauth::OAuthProviders;
use crate::domain::gateway::{IdentityProvider, ProviderTokens};
use crate::domain::value_object::identity::{OAuthProvider, ProviderProfile, ProviderSubject};
use crate::error::{AuthError, AuthResult};

use id_token::{IdTokenClaims, decode_unverified, string_claim, verify_with_jwks};

/// Fixed endpoints of one provider
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub jwks_url: String,
    pub scope: &'static str,
}

impl ProviderEndpoints {
    pub fn for_provider(provider: OAuthProvider) -> Self {
        match provider {
            OAuthProvider::Google => Self {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                jwks_url: "https://www.googleapis.com/oauth2/v3/certs".to_string(),
                scope: "openid profile email",
            },
            OAuthProvider::Microsoft => Self {
                authorize_url: "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
                    .to_string(),
                token_url: "https://login.microsoftonline.com/common/oauth2/v2.0/token"
                    .to_string(),
                jwks_url: "https://login.microsoftonline.com/common/discovery/v2.0/keys"
                    .to_string(),
                scope: "openid profile email",
            },
        }
    }
}

/// How long fetched signing keys are trusted before a refetch
const JWKS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct CachedJwks {
    fetched_at: Instant,
    keys: JwkSet,
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    id_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OidcProvider {
    provider: OAuthProvider,
    endpoints: ProviderEndpoints,
    credentials: ProviderCredentials,
    redirect_uri: String,
    verify_signature: bool,
    http: Client,
    jwks: Arc<RwLock<Option<CachedJwks>>>,
}

impl OidcProvider {
    pub fn new(
        provider: OAuthProvider,
        credentials: ProviderCredentials,
        api_url: &str,
        timeout: Duration,
        verify_signature: bool,
    ) -> AuthResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            provider,
            endpoints: ProviderEndpoints::for_provider(provider),
            credentials,
            redirect_uri: format!("{api_url}/oauth/{}/callback", provider.as_str()),
            verify_signature,
            http,
            jwks: Arc::new(RwLock::new(None)),
        })
    }

    /// Point at other endpoints (e.g. a local mock server)
    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Signing keys for a token signed with `kid`. Served from the cache
    /// while fresh; an unknown `kid` means the provider rotated its keys and
    /// forces a refetch.
    async fn signing_keys(&self, kid: Option<&str>) -> AuthResult<JwkSet> {
        if let Some(keys) = self.cached_keys(kid) {
            return Ok(keys);
        }

        let keys = self.fetch_jwks().await?;
        if let Ok(mut slot) = self.jwks.write() {
            *slot = Some(CachedJwks {
                fetched_at: Instant::now(),
                keys: keys.clone(),
            });
        }
        Ok(keys)
    }

    fn cached_keys(&self, kid: Option<&str>) -> Option<JwkSet> {
        let slot = self.jwks.read().ok()?;
        let cached = slot.as_ref()?;
        let fresh = cached.fetched_at.elapsed() < JWKS_CACHE_TTL;
        let knows_kid = kid.is_none_or(|kid| cached.keys.find(kid).is_some());
        (fresh && knows_kid).then(|| cached.keys.clone())
    }

    /// Transport, status and body failures are provider outages, not bad tokens
    async fn fetch_jwks(&self) -> AuthResult<JwkSet> {
        let response = self
            .http
            .get(&self.endpoints.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    provider = %self.provider,
                    timeout = e.is_timeout(),
                    error = %e,
                    "JWKS request failed"
                );
                AuthError::OAuthExchangeFailed
            })?;

        if !response.status().is_success() {
            tracing::error!(
                provider = %self.provider,
                status = %response.status(),
                "JWKS request rejected"
            );
            return Err(AuthError::OAuthExchangeFailed);
        }

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "Invalid JWKS document");
            AuthError::OAuthExchangeFailed
        })
    }

    fn profile_from_claims(&self, claims: &IdTokenClaims) -> AuthResult<ProviderProfile> {
        let name = string_claim(claims, "name").map(str::to_string);

        match self.provider {
            OAuthProvider::Google => {
                let subject = string_claim(claims, "sub")
                    .ok_or(AuthError::MalformedIdentityToken)?
                    .to_string();
                Ok(ProviderProfile {
                    subject: ProviderSubject::Google { subject },
                    email: string_claim(claims, "email").map(str::to_lowercase),
                    name,
                })
            }
            OAuthProvider::Microsoft => {
                let uuid_claim = |name: &str| {
                    string_claim(claims, name)
                        .and_then(|v| Uuid::parse_str(v).ok())
                        .ok_or(AuthError::MalformedIdentityToken)
                };
                Ok(ProviderProfile {
                    subject: ProviderSubject::Microsoft {
                        tenant_id: uuid_claim("tid")?,
                        object_id: uuid_claim("oid")?,
                    },
                    email: string_claim(claims, "email")
                        .or_else(|| string_claim(claims, "preferred_username"))
                        .map(str::to_lowercase),
                    name,
                })
            }
        }
    }
}

impl IdentityProvider for OidcProvider {
    fn provider(&self) -> OAuthProvider {
        self.provider
    }

    fn authorization_url(&self, state: &str) -> AuthResult<String> {
        let mut params = vec![
            ("client_id", self.credentials.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", self.endpoints.scope),
            ("state", state),
        ];
        match self.provider {
            OAuthProvider::Google => params.push(("access_type", "offline")),
            OAuthProvider::Microsoft => params.push(("response_mode", "query")),
        }

        Url::parse_with_params(&self.endpoints.authorize_url, &params)
            .map(String::from)
            .map_err(|e| AuthError::Internal(format!("Failed to build authorization URL: {e}")))
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderTokens> {
        let params = [
            ("code", code),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    provider = %self.provider,
                    timeout = e.is_timeout(),
                    error = %e,
                    "Token exchange request failed"
                );
                AuthError::OAuthExchangeFailed
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(provider = %self.provider, %status, body = %body, "Token exchange rejected");
            return Err(AuthError::OAuthExchangeFailed);
        }

        let tokens: TokenEndpointResponse = response.json().await.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "Invalid token response");
            AuthError::OAuthExchangeFailed
        })?;

        let id_token = tokens.id_token.ok_or_else(|| {
            tracing::error!(provider = %self.provider, "Token response without id_token");
            AuthError::OAuthExchangeFailed
        })?;

        Ok(ProviderTokens {
            access_token: tokens.access_token,
            id_token,
        })
    }

    async fn resolve_identity(&self, tokens: &ProviderTokens) -> AuthResult<ProviderProfile> {
        let mut claims = decode_unverified(&tokens.id_token)?;

        if self.verify_signature {
            let header =
                decode_header(&tokens.id_token).map_err(|_| AuthError::MalformedIdentityToken)?;
            let jwks = self.signing_keys(header.kid.as_deref()).await?;
            let issuers: &[&str] = match self.provider {
                OAuthProvider::Google => &["https://accounts.google.com", "accounts.google.com"],
                // Tenant-specific issuer, checked below
                OAuthProvider::Microsoft => &[],
            };
            claims = verify_with_jwks(
                &tokens.id_token,
                &jwks,
                &self.credentials.client_id,
                issuers,
            )?;

            if self.provider == OAuthProvider::Microsoft {
                let tid = string_claim(&claims, "tid").ok_or(AuthError::MalformedIdentityToken)?;
                let expected = format!("https://login.microsoftonline.com/{tid}/v2.0");
                if string_claim(&claims, "iss") != Some(expected.as_str()) {
                    return Err(AuthError::IdentitySignatureInvalid);
                }
            }
        }

        self.profile_from_claims(&claims)
    }
}

/// One client per configured provider
pub fn providers_from_config(config: &AuthConfig) -> AuthResult<OAuthProviders<OidcProvider>> {
    let build = |provider: OAuthProvider, credentials: &Option<ProviderCredentials>| {
        credentials
            .clone()
            .map(|credentials| {
                OidcProvider::new(
                    provider,
                    credentials,
                    &config.api_url,
                    config.oauth.http_timeout,
                    config.oauth.verify_id_token_signature,
                )
                .map(std::sync::Arc::new)
            })
            .transpose()
    };

    Ok(OAuthProviders {
        google: build(OAuthProvider::Google, &config.oauth.google)?,
        microsoft: build(OAuthProvider::Microsoft, &config.oauth.microsoft)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: OAuthProvider) -> OidcProvider {
        OidcProvider::new(
            kind,
            ProviderCredentials {
                client_id: "client-123".into(),
                client_secret: "secret".into(),
            },
            "http://localhost:31113",
            Duration::from_secs(5),
            false,
        )
        .unwrap()
    }

    fn id_token(payload: &str) -> String {
        use platform::crypto::to_base64url;
        format!(
            "{}.{}.sig",
            to_base64url(br#"{"alg":"RS256"}"#),
            to_base64url(payload.as_bytes())
        )
    }

    #[test]
    fn test_google_authorization_url() {
        let url = Url::parse(
            &provider(OAuthProvider::Google)
                .authorization_url("signed-state")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["response_type"], "code");
        assert_eq!(
            query["redirect_uri"],
            "http://localhost:31113/oauth/google/callback"
        );
        assert_eq!(query["scope"], "openid profile email");
        assert_eq!(query["state"], "signed-state");
        assert_eq!(query["access_type"], "offline");
    }

    #[test]
    fn test_microsoft_authorization_url() {
        let url = provider(OAuthProvider::Microsoft)
            .authorization_url("s")
            .unwrap();
        assert!(url.starts_with(
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize?"
        ));
        assert!(url.contains("response_mode=query"));
    }

    #[tokio::test]
    async fn test_google_identity_from_unverified_token() {
        let tokens = ProviderTokens {
            access_token: "at".into(),
            id_token: id_token(r#"{"sub":"g-1","email":"A@Gmail.com","name":"Ann"}"#),
        };
        let profile = provider(OAuthProvider::Google)
            .resolve_identity(&tokens)
            .await
            .unwrap();
        assert_eq!(
            profile.subject,
            ProviderSubject::Google {
                subject: "g-1".into()
            }
        );
        assert_eq!(profile.email.as_deref(), Some("a@gmail.com"));
        assert_eq!(profile.name.as_deref(), Some("Ann"));
    }

    #[tokio::test]
    async fn test_microsoft_identity_uses_preferred_username() {
        let tid = Uuid::new_v4();
        let oid = Uuid::new_v4();
        let tokens = ProviderTokens {
            access_token: "at".into(),
            id_token: id_token(&format!(
                r#"{{"tid":"{tid}","oid":"{oid}","preferred_username":"bob@contoso.com"}}"#
            )),
        };
        let profile = provider(OAuthProvider::Microsoft)
            .resolve_identity(&tokens)
            .await
            .unwrap();
        assert_eq!(
            profile.subject,
            ProviderSubject::Microsoft {
                tenant_id: tid,
                object_id: oid
            }
        );
        assert_eq!(profile.email.as_deref(), Some("bob@contoso.com"));
    }

    #[tokio::test]
    async fn test_missing_subject_is_malformed() {
        let tokens = ProviderTokens {
            access_token: "at".into(),
            id_token: id_token(r#"{"email":"a@gmail.com"}"#),
        };
        assert!(matches!(
            provider(OAuthProvider::Google).resolve_identity(&tokens).await,
            Err(AuthError::MalformedIdentityToken)
        ));
    }

    fn unreachable_endpoints() -> ProviderEndpoints {
        ProviderEndpoints {
            authorize_url: "http://127.0.0.1:9/authorize".into(),
            token_url: "http://127.0.0.1:9/token".into(),
            jwks_url: "http://127.0.0.1:9/keys".into(),
            scope: "openid",
        }
    }

    fn verifying_provider() -> OidcProvider {
        OidcProvider::new(
            OAuthProvider::Google,
            ProviderCredentials {
                client_id: "client-123".into(),
                client_secret: "secret".into(),
            },
            "http://localhost:31113",
            Duration::from_millis(300),
            true,
        )
        .unwrap()
        .with_endpoints(unreachable_endpoints())
    }

    fn signed_looking_token(kid: &str) -> ProviderTokens {
        use platform::crypto::to_base64url;
        let header = format!(r#"{{"alg":"RS256","typ":"JWT","kid":"{kid}"}}"#);
        ProviderTokens {
            access_token: "at".into(),
            id_token: format!(
                "{}.{}.{}",
                to_base64url(header.as_bytes()),
                to_base64url(br#"{"sub":"g-1","aud":"client-123"}"#),
                to_base64url(b"not-a-signature")
            ),
        }
    }

    #[tokio::test]
    async fn test_unreachable_jwks_is_provider_failure() {
        let result = verifying_provider()
            .resolve_identity(&signed_looking_token("k1"))
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, AuthError::OAuthExchangeFailed), "{err:?}");
        assert_eq!(err.status_code().as_u16(), 502);
    }

    #[tokio::test]
    async fn test_cached_jwks_used_without_fetch() {
        let client = verifying_provider();
        let keys: JwkSet = serde_json::from_value(serde_json::json!({
            "keys": [{
                "kty": "RSA",
                "kid": "k1",
                "alg": "RS256",
                "use": "sig",
                "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw",
                "e": "AQAB"
            }]
        }))
        .unwrap();
        *client.jwks.write().unwrap() = Some(CachedJwks {
            fetched_at: Instant::now(),
            keys,
        });

        // Key found in the cache, so the failure is the signature, not the network
        let result = client.resolve_identity(&signed_looking_token("k1")).await;
        assert!(matches!(result, Err(AuthError::IdentitySignatureInvalid)));

        // Unknown kid forces a refetch, which cannot reach the provider
        let result = client.resolve_identity(&signed_looking_token("k2")).await;
        assert!(matches!(result, Err(AuthError::OAuthExchangeFailed)));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint_fails_exchange() {
        let client = provider(OAuthProvider::Google).with_endpoints(unreachable_endpoints());
        assert!(matches!(
            client.exchange_code("code").await,
            Err(AuthError::OAuthExchangeFailed)
        ));
    }
}
