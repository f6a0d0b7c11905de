//! Identity Value Objects
//!
//! The three identity slots an account can hold and the provider-side
//! identifiers that fill the OAuth ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthError;

/// One of the identity slots attachable to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Local,
    Google,
    Microsoft,
}

impl IdentityKind {
    pub const ALL: [IdentityKind; 3] = [
        IdentityKind::Local,
        IdentityKind::Google,
        IdentityKind::Microsoft,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Local => "local",
            IdentityKind::Google => "google",
            IdentityKind::Microsoft => "microsoft",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External OpenID Connect provider (the `{provider}` path segment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Microsoft,
}

impl OAuthProvider {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Microsoft => "microsoft",
        }
    }

    pub const fn identity_kind(&self) -> IdentityKind {
        match self {
            OAuthProvider::Google => IdentityKind::Google,
            OAuthProvider::Microsoft => IdentityKind::Microsoft,
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "microsoft" => Ok(OAuthProvider::Microsoft),
            other => Err(AuthError::Validation(format!(
                "Unsupported OAuth provider: {other}"
            ))),
        }
    }
}

/// Provider-side discriminator of an identity slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderSubject {
    Google { subject: String },
    /// Unique as the (tenant, object) pair
    Microsoft { tenant_id: Uuid, object_id: Uuid },
}

impl ProviderSubject {
    pub fn provider(&self) -> OAuthProvider {
        match self {
            ProviderSubject::Google { .. } => OAuthProvider::Google,
            ProviderSubject::Microsoft { .. } => OAuthProvider::Microsoft,
        }
    }
}

/// Identity resolved from a provider's ID token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub subject: ProviderSubject,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_path() {
        assert_eq!("google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert_eq!(
            "microsoft".parse::<OAuthProvider>().unwrap(),
            OAuthProvider::Microsoft
        );
        assert!(matches!(
            "github".parse::<OAuthProvider>(),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_subject_provider() {
        let google = ProviderSubject::Google {
            subject: "123".into(),
        };
        assert_eq!(google.provider().identity_kind(), IdentityKind::Google);
        let ms = ProviderSubject::Microsoft {
            tenant_id: Uuid::new_v4(),
            object_id: Uuid::new_v4(),
        };
        assert_eq!(ms.provider(), OAuthProvider::Microsoft);
    }
}
