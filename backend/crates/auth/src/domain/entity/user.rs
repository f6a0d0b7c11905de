//! User Entity
//!
//! An account with up to three identity slots (local, Google, Microsoft).
//! At least one slot must stay linked for the account's whole lifetime.

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_object::{
    email::Email,
    full_name::FullName,
    identity::{IdentityKind, ProviderProfile, ProviderSubject},
    ids::UserId,
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// Username + password credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub username: Email,
    pub password_hash: HashedPassword,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrosoftIdentity {
    pub tenant_id: Uuid,
    pub object_id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub full_name: FullName,
    pub role: UserRole,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub local: Option<LocalIdentity>,
    pub google: Option<GoogleIdentity>,
    pub microsoft: Option<MicrosoftIdentity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Row version as read; every stored write bumps it and `update_user`
    /// only applies on a match
    pub version: i64,
}

/// Which slots a merge moved onto the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergedIdentities {
    pub local: bool,
    pub google: bool,
    pub microsoft: bool,
}

impl User {
    /// New account with only a local identity
    pub fn new_local(username: Email, password_hash: HashedPassword, full_name: FullName) -> Self {
        let now = Utc::now();
        Self {
            user_id: UserId::new(),
            full_name,
            role: UserRole::Guest,
            email_verified_at: None,
            local: Some(LocalIdentity {
                username,
                password_hash,
                enabled: true,
            }),
            google: None,
            microsoft: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// First OAuth login: the provider vouches for the e-mail, so the
    /// account starts verified.
    pub fn from_provider(profile: &ProviderProfile) -> Self {
        let now = Utc::now();
        let full_name = profile
            .name
            .as_deref()
            .or(profile.email.as_deref())
            .and_then(|n| FullName::new(n).ok())
            .unwrap_or_else(|| FullName::from_db(profile.subject.provider().as_str()));

        let mut user = Self {
            user_id: UserId::new(),
            full_name,
            role: UserRole::Guest,
            email_verified_at: Some(now),
            local: None,
            google: None,
            microsoft: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        user.set_provider_slot(profile);
        user
    }

    /// Slots that count as linked (a disabled local slot does not)
    pub fn linked_identities(&self) -> Vec<IdentityKind> {
        IdentityKind::ALL
            .into_iter()
            .filter(|kind| self.is_linked(*kind))
            .collect()
    }

    pub fn is_linked(&self, kind: IdentityKind) -> bool {
        match kind {
            IdentityKind::Local => self.local.as_ref().is_some_and(|l| l.enabled),
            IdentityKind::Google => self.google.is_some(),
            IdentityKind::Microsoft => self.microsoft.is_some(),
        }
    }

    fn has_slot(&self, kind: IdentityKind) -> bool {
        match kind {
            IdentityKind::Local => self.local.is_some(),
            IdentityKind::Google => self.google.is_some(),
            IdentityKind::Microsoft => self.microsoft.is_some(),
        }
    }

    /// Whether this account holds exactly this provider identity
    pub fn holds(&self, subject: &ProviderSubject) -> bool {
        match subject {
            ProviderSubject::Google { subject } => {
                self.google.as_ref().is_some_and(|g| &g.subject == subject)
            }
            ProviderSubject::Microsoft {
                tenant_id,
                object_id,
            } => self
                .microsoft
                .as_ref()
                .is_some_and(|m| &m.tenant_id == tenant_id && &m.object_id == object_id),
        }
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Keeps the first verification timestamp
    pub fn mark_email_verified(&mut self) {
        if self.email_verified_at.is_none() {
            let now = Utc::now();
            self.email_verified_at = Some(now);
            self.updated_at = now;
        }
    }

    /// Local username first, then provider e-mails
    pub fn primary_email(&self) -> Option<&str> {
        self.local
            .as_ref()
            .map(|l| l.username.as_str())
            .or_else(|| self.google.as_ref().and_then(|g| g.email.as_deref()))
            .or_else(|| self.microsoft.as_ref().and_then(|m| m.email.as_deref()))
    }

    pub fn local_username(&self) -> Option<&Email> {
        self.local.as_ref().map(|l| &l.username)
    }

    /// Local credentials usable for password login
    pub fn enabled_local(&self) -> Option<&LocalIdentity> {
        self.local.as_ref().filter(|l| l.enabled)
    }

    pub fn set_password(&mut self, password_hash: HashedPassword) -> AuthResult<()> {
        let local = self.local.as_mut().ok_or(AuthError::IdentityNotLinked)?;
        local.password_hash = password_hash;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Refresh the provider e-mail on a returning OAuth login.
    /// Returns whether anything changed.
    pub fn refresh_provider_email(&mut self, profile: &ProviderProfile) -> bool {
        if !self.holds(&profile.subject) {
            return false;
        }
        let stored = match profile.subject {
            ProviderSubject::Google { .. } => self.google.as_mut().map(|g| &mut g.email),
            ProviderSubject::Microsoft { .. } => self.microsoft.as_mut().map(|m| &mut m.email),
        };
        match stored {
            Some(email) if profile.email.is_some() && *email != profile.email => {
                email.clone_from(&profile.email);
                self.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Attach a provider identity; also marks the e-mail verified.
    ///
    /// The caller checks that no other account holds the identity.
    pub fn link(&mut self, profile: &ProviderProfile) {
        self.set_provider_slot(profile);
        self.mark_email_verified();
        self.updated_at = Utc::now();
    }

    fn set_provider_slot(&mut self, profile: &ProviderProfile) {
        match &profile.subject {
            ProviderSubject::Google { subject } => {
                self.google = Some(GoogleIdentity {
                    subject: subject.clone(),
                    email: profile.email.clone(),
                });
            }
            ProviderSubject::Microsoft {
                tenant_id,
                object_id,
            } => {
                self.microsoft = Some(MicrosoftIdentity {
                    tenant_id: *tenant_id,
                    object_id: *object_id,
                    email: profile.email.clone(),
                });
            }
        }
    }

    /// Detach one slot, refusing to leave the account with none
    pub fn unlink(&mut self, kind: IdentityKind) -> AuthResult<()> {
        if !self.has_slot(kind) {
            return Err(AuthError::IdentityNotLinked);
        }
        let remaining = self
            .linked_identities()
            .into_iter()
            .filter(|k| *k != kind)
            .count();
        if remaining == 0 {
            return Err(AuthError::LastIdentity);
        }

        match kind {
            IdentityKind::Local => self.local = None,
            IdentityKind::Google => self.google = None,
            IdentityKind::Microsoft => self.microsoft = None,
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move every populated slot of `source` onto `self`.
    ///
    /// Fails without touching `self` if both accounts hold a slot of the
    /// same kind.
    pub fn absorb(&mut self, source: User) -> AuthResult<MergedIdentities> {
        let conflicts: Vec<IdentityKind> = IdentityKind::ALL
            .into_iter()
            .filter(|kind| source.has_slot(*kind) && self.has_slot(*kind))
            .collect();
        if !conflicts.is_empty() {
            return Err(AuthError::ConflictingIdentity(conflicts));
        }

        let merged = MergedIdentities {
            local: source.local.is_some(),
            google: source.google.is_some(),
            microsoft: source.microsoft.is_some(),
        };

        if let Some(local) = source.local {
            self.local = Some(local);
        }
        if let Some(google) = source.google {
            self.google = Some(google);
        }
        if let Some(microsoft) = source.microsoft {
            self.microsoft = Some(microsoft);
        }
        if self.email_verified_at.is_none() {
            self.email_verified_at = source.email_verified_at;
        }
        self.updated_at = Utc::now();

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::password::{ClearTextPassword, PasswordHasher};

    fn local_user(email: &str) -> User {
        let hasher = PasswordHasher::new().unwrap();
        let hash = hasher.hash(&ClearTextPassword::new("Aa1!aaaa")).unwrap();
        User::new_local(
            Email::new(email).unwrap(),
            hash,
            FullName::new("Local User").unwrap(),
        )
    }

    fn google_profile(sub: &str) -> ProviderProfile {
        ProviderProfile {
            subject: ProviderSubject::Google {
                subject: sub.to_string(),
            },
            email: Some(format!("{sub}@gmail.com")),
            name: Some("Google User".to_string()),
        }
    }

    #[test]
    fn test_new_local_user_defaults() {
        let user = local_user("a@x.com");
        assert_eq!(user.role, UserRole::Guest);
        assert!(!user.is_email_verified());
        assert_eq!(user.linked_identities(), vec![IdentityKind::Local]);
        assert_eq!(user.primary_email(), Some("a@x.com"));
    }

    #[test]
    fn test_from_provider_is_verified() {
        let user = User::from_provider(&google_profile("g1"));
        assert!(user.is_email_verified());
        assert_eq!(user.full_name.as_str(), "Google User");
        assert_eq!(user.linked_identities(), vec![IdentityKind::Google]);
        assert_eq!(user.primary_email(), Some("g1@gmail.com"));
    }

    #[test]
    fn test_unlink_last_identity_fails() {
        let mut user = User::from_provider(&google_profile("g1"));
        assert!(matches!(
            user.unlink(IdentityKind::Google),
            Err(AuthError::LastIdentity)
        ));
        assert!(matches!(
            user.unlink(IdentityKind::Microsoft),
            Err(AuthError::IdentityNotLinked)
        ));
        assert!(user.google.is_some());
    }

    #[test]
    fn test_unlink_with_two_identities_leaves_one() {
        let mut user = local_user("a@x.com");
        user.link(&google_profile("g1"));
        assert_eq!(user.linked_identities().len(), 2);

        user.unlink(IdentityKind::Local).unwrap();
        assert_eq!(user.linked_identities(), vec![IdentityKind::Google]);
        assert!(matches!(
            user.unlink(IdentityKind::Google),
            Err(AuthError::LastIdentity)
        ));
    }

    #[test]
    fn test_disabled_local_does_not_count() {
        let mut user = local_user("a@x.com");
        user.link(&google_profile("g1"));
        if let Some(local) = user.local.as_mut() {
            local.enabled = false;
        }
        assert!(matches!(
            user.unlink(IdentityKind::Google),
            Err(AuthError::LastIdentity)
        ));
    }

    #[test]
    fn test_link_marks_verified() {
        let mut user = local_user("a@x.com");
        user.link(&google_profile("g1"));
        assert!(user.is_email_verified());
        assert!(user.holds(&ProviderSubject::Google {
            subject: "g1".into()
        }));
    }

    #[test]
    fn test_refresh_provider_email() {
        let mut user = User::from_provider(&google_profile("g1"));
        let mut profile = google_profile("g1");
        assert!(!user.refresh_provider_email(&profile));

        profile.email = Some("new@gmail.com".into());
        assert!(user.refresh_provider_email(&profile));
        assert_eq!(user.primary_email(), Some("new@gmail.com"));

        assert!(!user.refresh_provider_email(&google_profile("other")));
    }

    #[test]
    fn test_absorb_copies_slots() {
        let mut destination = local_user("a@x.com");
        let source = User::from_provider(&google_profile("g1"));

        let merged = destination.absorb(source).unwrap();
        assert_eq!(
            merged,
            MergedIdentities {
                local: false,
                google: true,
                microsoft: false
            }
        );
        assert!(destination.google.is_some());
        assert!(destination.is_email_verified());
    }

    #[test]
    fn test_absorb_conflict_leaves_destination_untouched() {
        let mut destination = local_user("a@x.com");
        destination.link(&google_profile("g1"));
        let mut source = local_user("b@x.com");
        source.link(&google_profile("g2"));

        let err = destination.absorb(source).unwrap_err();
        assert!(matches!(
            err,
            AuthError::ConflictingIdentity(ref kinds)
                if kinds == &[IdentityKind::Local, IdentityKind::Google]
        ));
        assert_eq!(destination.local_username().unwrap().as_str(), "a@x.com");
    }
}
