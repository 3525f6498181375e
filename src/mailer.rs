//! Outgoing mail.
//!
//! Delivery is behind the [`Mailer`] trait. The service ships [`LogMailer`], which writes
//! messages to the log, and [`MemoryMailer`], which keeps them for inspection in tests.

use crate::models::User;
use reqwest::Url;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid link base URL: {0}")]
    InvalidLink(String),
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Writes every message to the log at `info` level.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        log::info!(
            "Mail to {} | {}\n{}",
            message.to,
            message.subject,
            message.body
        );
        Ok(())
    }
}

/// Keeps sent messages in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError::Delivery("mailbox lock poisoned".into()))?
            .push(message.clone());
        Ok(())
    }
}

/// Link a user follows to confirm their address.
pub fn verification_link(public_url: &str, token: &str) -> Result<Url, MailError> {
    let base = format!(
        "{}/local/email/verification",
        public_url.trim_end_matches('/')
    );
    Url::parse_with_params(&base, &[("token", token)])
        .map_err(|e| MailError::InvalidLink(e.to_string()))
}

pub fn verification_message(
    public_url: &str,
    user: &User,
    token: &str,
) -> Result<MailMessage, MailError> {
    let link = verification_link(public_url, token)?;
    Ok(MailMessage {
        to: user.email.clone(),
        subject: "Verify your email address".to_string(),
        body: format!(
            "Hi {},\n\nConfirm your email address by opening the link below:\n\n{}\n\n\
             If you did not create an account, you can ignore this message.\n",
            user.username, link
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user() -> User {
        User {
            id: 1,
            username: "grace".into(),
            email: "grace@example.com".into(),
            password_hash: None,
            is_verified: false,
            google_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_verification_link() {
        let link = verification_link("https://auth.example.com/", "abc123").unwrap();
        assert_eq!(
            link.as_str(),
            "https://auth.example.com/local/email/verification?token=abc123"
        );

        assert!(verification_link("not a url", "abc123").is_err());
    }

    #[test]
    fn test_memory_mailer_records_verification_message() {
        let mailer = MemoryMailer::default();
        let message = verification_message("http://localhost:8080", &user(), "tok").unwrap();
        mailer.send(&message).unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "grace@example.com");
        assert!(sent[0].body.contains("Hi grace"));
        assert!(sent[0].body.contains("verification?token=tok"));
    }
}
