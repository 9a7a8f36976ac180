//! Wintersmith.AI site backend.
//!
//! Three stateless HTTP handlers in front of external services:
//! - Contact form: reCAPTCHA check, then an email to the operator
//! - Invoice creation: Stripe customer, items and invoice, then an email with the payment link
//! - Stripe webhook: on `invoice.paid`, a thank-you email to the payer
//!
//! ## Architecture
//!
//! ```text
//! HTTP → web handlers → CaptchaVerifier / BillingClient / MailSender → external services
//! ```

pub mod billing;
pub mod captcha;
pub mod config;
pub mod error;
pub mod mail;
pub mod web;

#[cfg(test)]
mod fake_server;

// Re-export commonly used types
pub use billing::{BillingClient, StripeClient};
pub use captcha::{CaptchaVerifier, RecaptchaVerifier};
pub use config::Config;
pub use error::ApiError;
pub use mail::{EmailMessage, MailSender, SmtpMailer};
pub use web::{router, AppState};
