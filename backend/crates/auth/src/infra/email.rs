//! E-mail Senders
//!
//! Delivery is outside this service. `LoggingEmailSender` records that a
//! message would go out; `RecordingEmailSender` keeps the messages so tests
//! and local runs can pick the token up.

use std::sync::Mutex;

use crate::domain::gateway::EmailSender;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

pub struct LoggingEmailSender {
    frontend_url: String,
}

impl LoggingEmailSender {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into(),
        }
    }

    /// Frontend page the link opens, without the token
    pub fn page(&self, kind: EmailKind) -> String {
        let path = match kind {
            EmailKind::Verification => "verify-email",
            EmailKind::PasswordReset => "reset-password",
        };
        format!("{}/{path}", self.frontend_url)
    }
}

impl EmailSender for LoggingEmailSender {
    async fn send_verification(&self, to: &str, full_name: &str, _token: &str) -> AuthResult<()> {
        let page = self.page(EmailKind::Verification);
        tracing::info!(to = %to, name = %full_name, page = %page, "Verification email dispatched");
        Ok(())
    }

    async fn send_password_reset(
        &self,
        to: &str,
        full_name: &str,
        _token: &str,
    ) -> AuthResult<()> {
        let page = self.page(EmailKind::PasswordReset);
        tracing::info!(to = %to, name = %full_name, page = %page, "Password reset email dispatched");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub kind: EmailKind,
    pub token: String,
}

#[derive(Default)]
pub struct RecordingEmailSender {
    outbox: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Token of the newest message of `kind` to `to`
    pub fn last_token_for(&self, to: &str, kind: EmailKind) -> Option<String> {
        self.outbox.lock().ok().and_then(|outbox| {
            outbox
                .iter()
                .rev()
                .find(|m| m.to == to && m.kind == kind)
                .map(|m| m.token.clone())
        })
    }

    fn record(&self, to: &str, kind: EmailKind, token: &str) -> AuthResult<()> {
        self.outbox
            .lock()
            .map_err(|_| AuthError::Internal("Outbox lock poisoned".to_string()))?
            .push(SentEmail {
                to: to.to_string(),
                kind,
                token: token.to_string(),
            });
        Ok(())
    }
}

impl EmailSender for RecordingEmailSender {
    async fn send_verification(&self, to: &str, _full_name: &str, token: &str) -> AuthResult<()> {
        self.record(to, EmailKind::Verification, token)
    }

    async fn send_password_reset(
        &self,
        to: &str,
        _full_name: &str,
        token: &str,
    ) -> AuthResult<()> {
        self.record(to, EmailKind::PasswordReset, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_point_at_frontend() {
        let sender = LoggingEmailSender::new("http://localhost:4000");
        assert_eq!(
            sender.page(EmailKind::Verification),
            "http://localhost:4000/verify-email"
        );
        assert_eq!(
            sender.page(EmailKind::PasswordReset),
            "http://localhost:4000/reset-password"
        );
    }

    #[tokio::test]
    async fn test_recording_sender_keeps_newest_token() {
        let sender = RecordingEmailSender::new();
        sender.send_verification("a@x.com", "A", "t1").await.unwrap();
        sender.send_verification("a@x.com", "A", "t2").await.unwrap();
        sender.send_password_reset("a@x.com", "A", "r1").await.unwrap();

        assert_eq!(
            sender.last_token_for("a@x.com", EmailKind::Verification).as_deref(),
            Some("t2")
        );
        assert_eq!(
            sender.last_token_for("a@x.com", EmailKind::PasswordReset).as_deref(),
            Some("r1")
        );
        assert!(sender.last_token_for("b@x.com", EmailKind::Verification).is_none());
        assert_eq!(sender.sent().len(), 3);
    }
}
