//! Outbound email.
//!
//! Handlers build an `EmailMessage` from one of the `templates` and hand it to
//! a `MailSender`. The SMTP implementation is constructed once at startup.

pub mod smtp;
pub mod templates;

use async_trait::async_trait;
use thiserror::Error;

pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("smtp server did not accept the connection")]
    Unavailable,
}

/// A single HTML email, built fresh per notification.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;

    /// Check that the server is reachable and accepts our credentials.
    async fn verify_connection(&self) -> Result<(), MailError>;
}
