//! SMTP delivery through lettre's pooled async transport.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use super::{EmailMessage, MailError, MailSender};
use crate::Config;

/// Port on which the relay expects implicit TLS instead of STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Shared SMTP sender; connections are pooled internally.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        user: String,
        pass: String,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let builder = if port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };

        let transport = builder
            .port(port)
            .credentials(Credentials::new(user, pass))
            .timeout(Some(timeout))
            .build();

        Ok(Self { transport })
    }

    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        Self::new(
            &config.smtp_host,
            config.smtp_port,
            config.smtp_user.clone(),
            config.smtp_pass.clone(),
            config.request_timeout(),
        )
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn build_message(message: &EmailMessage) -> Result<Message, MailError> {
    Ok(Message::builder()
        .from(parse_mailbox(&message.from)?)
        .to(parse_mailbox(&message.to)?)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(message.html.clone())?)
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let email = build_message(&message)?;

        let response = self.transport.send(email).await?;

        info!(
            to = %message.to,
            subject = %message.subject,
            accepted = response.is_positive(),
            "smtp_message_sent"
        );

        Ok(())
    }

    async fn verify_connection(&self) -> Result<(), MailError> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            Err(MailError::Unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            from: "\"Wintersmith.AI\" <mailer@example.com>".to_string(),
            to: to.to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
        }
    }

    #[test]
    fn test_build_message() {
        let email = build_message(&message("client@example.com")).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("mailer@example.com"));
        assert!(raw.contains("client@example.com"));
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let result = build_message(&message("not an address"));

        assert!(matches!(result, Err(MailError::Address { .. })));
    }

    #[tokio::test]
    async fn test_transport_builds_for_both_tls_modes() {
        let timeout = Duration::from_secs(5);

        assert!(SmtpMailer::new("smtp.example.com", 587, "u".into(), "p".into(), timeout).is_ok());
        assert!(SmtpMailer::new("smtp.example.com", 465, "u".into(), "p".into(), timeout).is_ok());
    }
}
