//! Outgoing email: the [`Mailer`] seam plus SMTP and logging implementations.
//!
//! Delivery is best-effort from the auth flows' point of view; see [`send_best_effort`].

pub mod smtp;
pub mod templates;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail configuration error: {0}")]
    Config(String),
    #[error("invalid address: {0}")]
    Address(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Send and swallow failures: the state that triggered the email is already stored.
pub async fn send_best_effort(mailer: &dyn Mailer, message: EmailMessage) {
    let to = message.to.clone();
    let subject = message.subject.clone();
    match mailer.send(message).await {
        Ok(()) => debug!(%to, %subject, "email dispatched"),
        Err(e) => warn!(%to, %subject, error = %e, "email delivery failed; continuing"),
    }
}

/// Mailer used when no SMTP host is configured: writes the message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, "smtp not configured; email not sent");
        debug!(body = %message.body, "unsent email body");
        Ok(())
    }
}

/// In-memory mailers for tests and doc examples
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every message it is asked to send.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap().clone()
        }

        pub fn last_to(&self, to: &str) -> Option<EmailMessage> {
            self.sent.lock().unwrap().iter().rev().find(|m| m.to == to).cloned()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// Always fails, to exercise best-effort delivery.
    #[derive(Default)]
    pub struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _message: EmailMessage) -> Result<(), MailError> {
            Err(MailError::Delivery("smtp unavailable".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{FailingMailer, RecordingMailer};
    use super::*;

    fn msg(to: &str) -> EmailMessage {
        EmailMessage { to: to.into(), subject: "s".into(), body: "b".into() }
    }

    #[tokio::test]
    async fn recording_mailer_keeps_messages() {
        let mailer = RecordingMailer::default();
        send_best_effort(&mailer, msg("a@example.com")).await;
        send_best_effort(&mailer, msg("b@example.com")).await;
        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(mailer.last_to("a@example.com").map(|m| m.to), Some("a@example.com".to_string()));
    }

    #[tokio::test]
    async fn failures_do_not_propagate() {
        // Returns unit either way; the point is that it does not panic or error.
        send_best_effort(&FailingMailer, msg("a@example.com")).await;
        assert!(LogMailer.send(msg("a@example.com")).await.is_ok());
    }
}
