//! Entity Module

pub mod audit_event;
pub mod ephemeral_token;
pub mod oauth_state;
pub mod refresh_session;
pub mod user;
