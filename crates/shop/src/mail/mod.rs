//! Outgoing mail.
//!
//! The shop sends one kind of mail, the password reset link. Delivery goes
//! through the [`Mailer`] capability: [`smtp::SmtpMailer`] in production,
//! [`LogMailer`] when no relay is configured, [`RecordingMailer`] in tests.

pub mod smtp;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

use sick_fits_core::Email;

/// Errors that can occur when sending mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Failed to build the message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid sender or recipient address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// The mailer refused the message.
    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub html: String,
}

/// Something that can deliver mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send an HTML message to one recipient.
    async fn send_mail(&self, to: &Email, message: &MailMessage) -> Result<(), MailError>;
}

/// Link the reset mail points at.
#[must_use]
pub fn reset_link(frontend_url: &Url, token: &str) -> String {
    format!(
        "{}/reset?resetToken={token}",
        frontend_url.as_str().trim_end_matches('/')
    )
}

/// The password reset mail.
#[must_use]
pub fn password_reset_message(frontend_url: &Url, token: &str) -> MailMessage {
    let link = reset_link(frontend_url, token);
    MailMessage {
        subject: "Your Password Reset Token".to_string(),
        html: format!(
            "<div style=\"border: 1px solid black; padding: 20px; \
             font-family: sans-serif; line-height: 2; font-size: 20px;\">\
             <h2>Hello There!</h2>\
             <p>Your Password Reset Token is here!</p>\
             <p><a href=\"{link}\">Click Here to Reset</a></p>\
             <p>This link expires in one hour.</p>\
             <p>😘, Sick Fits</p>\
             </div>"
        ),
    }
}

/// Mailer that only logs. Used when SMTP is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_mail(&self, to: &Email, message: &MailMessage) -> Result<(), MailError> {
        tracing::info!(to = %to, subject = %message.subject, "SMTP not configured, mail not sent");
        Ok(())
    }
}

/// A message captured by [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: Email,
    pub message: MailMessage,
}

/// Mailer that keeps messages in memory.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail: bool,
}

impl RecordingMailer {
    /// Record every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages delivered so far.
    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, to: &Email, message: &MailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Rejected("relay unavailable".to_string()));
        }
        self.sent.lock().await.push(SentMail {
            to: to.clone(),
            message: message.clone(),
        });
        Ok(())
    }
}
