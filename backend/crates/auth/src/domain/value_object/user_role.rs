use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role; new accounts always start as `Guest`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Guest,
    Admin,
    Sysadmin,
}

impl UserRole {
    #[inline]
    pub const fn code(&self) -> &'static str {
        use UserRole::*;
        match self {
            Guest => "guest",
            Admin => "admin",
            Sysadmin => "sysadmin",
        }
    }

    #[inline]
    pub const fn is_admin_or_higher(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Sysadmin)
    }

    #[inline]
    pub const fn is_sysadmin(&self) -> bool {
        matches!(self, UserRole::Sysadmin)
    }

    /// `None` for unknown codes; callers decide whether that is corruption or bad input
    pub fn from_code(code: &str) -> Option<Self> {
        use UserRole::*;
        match code {
            "guest" => Some(Guest),
            "admin" => Some(Admin),
            "sysadmin" => Some(Sysadmin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_from_code() {
        assert_eq!(UserRole::from_code("guest"), Some(UserRole::Guest));
        assert_eq!(UserRole::from_code("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_code("sysadmin"), Some(UserRole::Sysadmin));
        assert_eq!(UserRole::from_code("super_admin"), None);
    }

    #[test]
    fn test_user_role_serde_matches_code() {
        for role in [UserRole::Guest, UserRole::Admin, UserRole::Sysadmin] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.code()));
        }
    }

    #[test]
    fn test_user_role_checks() {
        assert!(!UserRole::Guest.is_admin_or_higher());
        assert!(UserRole::Admin.is_admin_or_higher());
        assert!(UserRole::Sysadmin.is_admin_or_higher());
        assert!(!UserRole::Admin.is_sysadmin());
        assert!(UserRole::Sysadmin.is_sysadmin());
    }
}
