//! Billing provider integration.
//!
//! This module provides:
//! - The `BillingClient` trait the handlers depend on
//! - A Stripe implementation over the REST API
//! - Webhook signature verification
//!
//! The provider is the only source of truth for customers and invoices; nothing
//! here is persisted.

pub mod signature;
pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use signature::{construct_event, SignatureError, SIGNATURE_HEADER};
pub use stripe::StripeClient;

/// Currency every invoice item is billed in.
pub const INVOICE_CURRENCY: &str = "usd";

/// Event type acted upon by the webhook handler.
pub const INVOICE_PAID: &str = "invoice.paid";

#[derive(Debug, Error)]
pub enum BillingError {
    /// The provider answered with an error message.
    #[error("{message}")]
    Provider { status: u16, message: String },

    #[error("billing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid billing URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("finalized invoice {0} has no hosted URL")]
    MissingHostedUrl(String),
}

impl BillingError {
    /// Message reported by the provider itself, if any.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            BillingError::Provider { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// A billing customer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One invoice line as submitted by the requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    /// Price per unit in minor currency units (cents).
    pub unit_amount: i64,
    pub quantity: i64,
}

impl LineItem {
    pub fn is_valid(&self) -> bool {
        !self.description.trim().is_empty() && self.unit_amount >= 0 && self.quantity > 0
    }
}

/// The subset of a provider invoice this service reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
}

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// Opaque object whose shape depends on the event type.
    pub object: serde_json::Value,
}

/// Operations the handlers need from the billing provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// First customer whose email matches exactly, if any.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>, BillingError>;

    async fn create_customer(&self, name: &str, email: &str) -> Result<Customer, BillingError>;

    /// Attach a pending line item to the customer's next invoice.
    async fn create_invoice_item(
        &self,
        customer_id: &str,
        item: &LineItem,
        currency: &str,
    ) -> Result<(), BillingError>;

    /// Create a draft invoice collected by emailed link.
    async fn create_invoice(
        &self,
        customer_id: &str,
        days_until_due: u32,
    ) -> Result<Invoice, BillingError>;

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<Invoice, BillingError>;

    async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer, BillingError>;

    /// Verify a webhook delivery and decode its event.
    fn construct_event(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<PaymentEvent, SignatureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_validation() {
        let item = |description: &str, unit_amount, quantity| LineItem {
            description: description.to_string(),
            unit_amount,
            quantity,
        };

        assert!(item("Consulting", 15000, 2).is_valid());
        assert!(item("Free audit", 0, 1).is_valid());
        assert!(!item("", 100, 1).is_valid());
        assert!(!item("  ", 100, 1).is_valid());
        assert!(!item("Refund", -100, 1).is_valid());
        assert!(!item("Nothing", 100, 0).is_valid());
    }

    #[test]
    fn test_provider_message() {
        let err = BillingError::Provider {
            status: 402,
            message: "Your card was declined.".to_string(),
        };
        assert_eq!(err.provider_message(), Some("Your card was declined."));
        assert_eq!(err.to_string(), "Your card was declined.");

        let err = BillingError::MissingHostedUrl("in_1".to_string());
        assert_eq!(err.provider_message(), None);
    }

    #[test]
    fn test_invoice_paid_object_decodes() {
        let object = serde_json::json!({
            "id": "in_123",
            "object": "invoice",
            "customer": "cus_456",
            "amount_paid": 4999,
            "status": "paid"
        });

        let invoice: Invoice = serde_json::from_value(object).unwrap();

        assert_eq!(invoice.customer.as_deref(), Some("cus_456"));
        assert_eq!(invoice.amount_paid, 4999);
        assert!(invoice.hosted_invoice_url.is_none());
    }
}
