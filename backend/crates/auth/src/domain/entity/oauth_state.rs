//! OAuth State
//!
//! What the callback needs to finish a flow. Never persisted: it travels
//! through the provider as a signed, short-lived token.

use serde::{Deserialize, Serialize};

use crate::domain::value_object::{identity::OAuthProvider, ids::UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthMode {
    Login,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    pub provider: OAuthProvider,
    /// Where the browser ends up after the callback
    pub redirect: String,
    pub frontend: Option<String>,
    pub mode: OAuthMode,
    /// Present exactly in link mode
    pub current_user_id: Option<UserId>,
}

impl OAuthState {
    pub fn login(provider: OAuthProvider, redirect: String, frontend: Option<String>) -> Self {
        Self {
            provider,
            redirect,
            frontend,
            mode: OAuthMode::Login,
            current_user_id: None,
        }
    }

    pub fn link(
        provider: OAuthProvider,
        redirect: String,
        frontend: Option<String>,
        user_id: UserId,
    ) -> Self {
        Self {
            provider,
            redirect,
            frontend,
            mode: OAuthMode::Link,
            current_user_id: Some(user_id),
        }
    }
}
