//! Stripe webhook endpoint.
//!
//! Once the signature checks out the event is always acknowledged with 200:
//! any other status makes Stripe redeliver, so failures while emailing the
//! payer are logged and swallowed.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use super::AppState;
use crate::billing::{BillingError, Invoice, PaymentEvent, INVOICE_PAID, SIGNATURE_HEADER};
use crate::error::ApiError;
use crate::mail::{templates, MailError};

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Error)]
enum ThankYouError {
    #[error("invoice object could not be decoded: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invoice {0} has no customer")]
    NoCustomer(String),

    #[error("customer {0} has no email address")]
    NoEmail(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Stripe webhook endpoint.
///
/// 1. Verifies the signature over the raw body
/// 2. On `invoice.paid`, emails the customer a thank-you note
/// 3. Acknowledges every verified event
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = state
        .billing
        .construct_event(&body, signature, &state.config.stripe_webhook_secret)
        .map_err(|e| {
            warn!(
                error = %e,
                has_signature = !signature.is_empty(),
                body_length = body.len(),
                "webhook_signature_invalid"
            );
            ApiError::Verification(e.to_string())
        })?;

    info!(
        event_id = %event.id,
        event_type = %event.event_type,
        "webhook_event_received"
    );

    match event.event_type.as_str() {
        INVOICE_PAID => {
            if let Err(e) = send_thank_you(&state, &event).await {
                error!(event_id = %event.id, error = %e, "webhook_thank_you_failed");
            }
        }
        other => {
            info!(event_type = other, "webhook_event_unhandled");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

async fn send_thank_you(state: &AppState, event: &PaymentEvent) -> Result<(), ThankYouError> {
    let invoice: Invoice = serde_json::from_value(event.data.object.clone())?;
    let customer_id = invoice
        .customer
        .as_deref()
        .ok_or_else(|| ThankYouError::NoCustomer(invoice.id.clone()))?;

    let customer = state.billing.retrieve_customer(customer_id).await?;
    let email = customer
        .email
        .ok_or_else(|| ThankYouError::NoEmail(customer.id.clone()))?;

    let message = templates::payment_received(
        customer.name.as_deref().unwrap_or_default(),
        invoice.amount_paid,
    )
    .into_message(state.config.sender(), &email);

    state.mailer.send(message).await?;

    info!(
        event_id = %event.id,
        invoice_id = %invoice.id,
        to = %email,
        "webhook_thank_you_sent"
    );

    Ok(())
}
