//! Invoice creation endpoint.
//!
//! Drives the billing provider through find-or-create customer, line items,
//! invoice creation and finalization, then emails the hosted payment link.
//! Nothing is rolled back on partial failure: line items created before an
//! error stay pending on the provider side.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::AppState;
use crate::billing::{BillingClient, BillingError, Customer, LineItem, INVOICE_CURRENCY};
use crate::error::ApiError;
use crate::mail::{templates, MailError};

/// Days until due when the request names no due date.
pub const DEFAULT_DAYS_UNTIL_DUE: u32 = 30;

const GENERIC_FAILURE: &str = "Invoice generation failed";

/// Invoice request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Raw items, decoded into `LineItem`s by `validate`.
    #[serde(default)]
    pub items: Option<serde_json::Value>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub success: bool,
    pub url: String,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
struct ValidInvoice {
    name: String,
    email: String,
    items: Vec<LineItem>,
    days_until_due: u32,
}

/// A parsed due date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DueDate {
    /// Calendar date, compared against today's date.
    Day(NaiveDate),
    /// Exact instant, compared against now.
    Instant(DateTime<Utc>),
}

impl DueDate {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(DueDate::Day(day));
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| DueDate::Instant(t.with_timezone(&Utc)))
    }
}

/// Whole days from `now` until `due`, never negative.
pub fn days_until_due(due: Option<DueDate>, now: DateTime<Utc>) -> u32 {
    let days = match due {
        None => return DEFAULT_DAYS_UNTIL_DUE,
        Some(DueDate::Day(day)) => (day - now.date_naive()).num_days(),
        Some(DueDate::Instant(at)) => (at - now).num_days(),
    };
    days.clamp(0, u32::MAX as i64) as u32
}

impl InvoiceRequest {
    fn validate(self, now: DateTime<Utc>) -> Result<ValidInvoice, ApiError> {
        let name = self.name.filter(|s| !s.trim().is_empty());
        let email = self.email.filter(|s| !s.trim().is_empty());
        let items = match self.items {
            Some(serde_json::Value::Array(items)) if !items.is_empty() => Some(items),
            _ => None,
        };

        let (name, email, items) = match (name, email, items) {
            (Some(name), Some(email), Some(items)) => (name, email, items),
            _ => {
                return Err(ApiError::Validation(
                    "Missing required fields: name, email, items".to_string(),
                ))
            }
        };

        let items = items
            .into_iter()
            .map(|raw| {
                serde_json::from_value::<LineItem>(raw)
                    .ok()
                    .filter(LineItem::is_valid)
                    .ok_or_else(|| ApiError::Validation("Invalid item format".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let due = match self.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                DueDate::parse(raw)
                    .ok_or_else(|| ApiError::Validation("Invalid due_date".to_string()))?,
            ),
        };

        Ok(ValidInvoice {
            name,
            email,
            items,
            days_until_due: days_until_due(due, now),
        })
    }
}

#[derive(Debug, Error)]
enum InvoiceError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

impl From<InvoiceError> for ApiError {
    fn from(err: InvoiceError) -> Self {
        let message = match &err {
            InvoiceError::Billing(e) => e.provider_message().unwrap_or(GENERIC_FAILURE),
            InvoiceError::Mail(_) => GENERIC_FAILURE,
        };
        ApiError::Delivery(message.to_string())
    }
}

/// Invoice creation endpoint.
pub async fn create_invoice(
    State(state): State<AppState>,
    payload: Result<Json<InvoiceRequest>, JsonRejection>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!(error = %e, "invoice_payload_invalid");
        ApiError::from(e)
    })?;

    let invoice = request.validate(Utc::now()).map_err(|e| {
        warn!(error = %e, "invoice_request_invalid");
        e
    })?;

    info!(
        email = %invoice.email,
        item_count = invoice.items.len(),
        days_until_due = invoice.days_until_due,
        "invoice_requested"
    );

    match issue_invoice(&state, &invoice).await {
        Ok(url) => Ok(Json(InvoiceResponse { success: true, url })),
        Err(e) => {
            error!(error = %e, email = %invoice.email, "invoice_generation_failed");
            Err(e.into())
        }
    }
}

async fn issue_invoice(state: &AppState, invoice: &ValidInvoice) -> Result<String, InvoiceError> {
    let billing = state.billing.as_ref();

    let customer = resolve_customer(billing, &invoice.name, &invoice.email).await?;

    for item in &invoice.items {
        billing
            .create_invoice_item(&customer.id, item, INVOICE_CURRENCY)
            .await?;
    }

    let draft = billing
        .create_invoice(&customer.id, invoice.days_until_due)
        .await?;
    let finalized = billing.finalize_invoice(&draft.id).await?;
    let url = finalized
        .hosted_invoice_url
        .ok_or(BillingError::MissingHostedUrl(finalized.id.clone()))?;

    info!(
        customer_id = %customer.id,
        invoice_id = %finalized.id,
        "invoice_finalized"
    );

    let message = templates::invoice_ready(&invoice.name, &url)
        .into_message(state.config.sender(), &invoice.email);
    state.mailer.send(message).await?;

    info!(email = %invoice.email, invoice_id = %finalized.id, "invoice_link_sent");

    Ok(url)
}

/// Find the first customer with this email, or create one.
///
/// Concurrent requests for a new email can both miss the lookup and create
/// duplicate customers.
async fn resolve_customer(
    billing: &dyn BillingClient,
    name: &str,
    email: &str,
) -> Result<Customer, BillingError> {
    if let Some(existing) = billing.find_customer_by_email(email).await? {
        info!(customer_id = %existing.id, "invoice_customer_found");
        return Ok(existing);
    }

    billing.create_customer(name, email).await
}
