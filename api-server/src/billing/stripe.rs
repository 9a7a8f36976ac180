//! Stripe REST API client.
//!
//! Only the handful of endpoints the invoice and webhook flows need. Requests
//! are form-encoded; responses are JSON.
//! Reference: https://docs.stripe.com/api

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{info, warn};
use url::Url;

use super::{
    signature, BillingClient, BillingError, Customer, Invoice, LineItem, PaymentEvent,
    SignatureError,
};

/// API version pinned for every request.
pub const STRIPE_API_VERSION: &str = "2022-11-15";

/// Long-lived Stripe client, shared across requests.
#[derive(Clone)]
pub struct StripeClient {
    http_client: Client,
    api_base: Url,
    secret_key: String,
    webhook_tolerance_secs: u64,
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct InvoiceItemCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

impl StripeClient {
    pub fn new(
        http_client: Client,
        api_base: Url,
        secret_key: String,
        webhook_tolerance_secs: u64,
    ) -> Self {
        Self {
            http_client,
            api_base,
            secret_key,
            webhook_tolerance_secs,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, BillingError> {
        Ok(self.api_base.join(path)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BillingError> {
        let response = self
            .http_client
            .get(self.endpoint(path)?)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .query(query)
            .send()
            .await?;

        decode(path, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, BillingError> {
        let response = self
            .http_client
            .post(self.endpoint(path)?)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .form(form)
            .send()
            .await?;

        decode(path, response).await
    }
}

/// Decode a success body, or turn an error body into `BillingError::Provider`.
async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, BillingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let err = provider_error(status.as_u16(), &body);

    warn!(
        path = path,
        status_code = status.as_u16(),
        error = %err,
        "stripe_request_failed"
    );

    Err(err)
}

fn provider_error(status: u16, body: &str) -> BillingError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();

    let message = parsed
        .and_then(|envelope| {
            envelope
                .error
                .message
                .or(envelope.error.error_type)
        })
        .unwrap_or_else(|| format!("Stripe request failed with status {}", status));

    BillingError::Provider { status, message }
}

#[async_trait]
impl BillingClient for StripeClient {
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>, BillingError> {
        let list: List<Customer> = self
            .get("customers", &[("email", email), ("limit", "1")])
            .await?;

        Ok(list.data.into_iter().next())
    }

    async fn create_customer(&self, name: &str, email: &str) -> Result<Customer, BillingError> {
        let customer: Customer = self
            .post(
                "customers",
                &[("name", name.to_string()), ("email", email.to_string())],
            )
            .await?;

        info!(customer_id = %customer.id, "stripe_customer_created");

        Ok(customer)
    }

    async fn create_invoice_item(
        &self,
        customer_id: &str,
        item: &LineItem,
        currency: &str,
    ) -> Result<(), BillingError> {
        let created: InvoiceItemCreated = self
            .post(
                "invoiceitems",
                &[
                    ("customer", customer_id.to_string()),
                    ("description", item.description.clone()),
                    ("unit_amount", item.unit_amount.to_string()),
                    ("quantity", item.quantity.to_string()),
                    ("currency", currency.to_string()),
                ],
            )
            .await?;

        info!(
            customer_id = customer_id,
            invoice_item_id = %created.id,
            "stripe_invoice_item_created"
        );

        Ok(())
    }

    async fn create_invoice(
        &self,
        customer_id: &str,
        days_until_due: u32,
    ) -> Result<Invoice, BillingError> {
        self.post(
            "invoices",
            &[
                ("customer", customer_id.to_string()),
                ("collection_method", "send_invoice".to_string()),
                ("days_until_due", days_until_due.to_string()),
            ],
        )
        .await
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<Invoice, BillingError> {
        self.post(&format!("invoices/{}/finalize", invoice_id), &[])
            .await
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer, BillingError> {
        self.get(&format!("customers/{}", customer_id), &[]).await
    }

    fn construct_event(
        &self,
        payload: &[u8],
        header: &str,
        secret: &str,
    ) -> Result<PaymentEvent, SignatureError> {
        signature::construct_event(payload, header, secret, self.webhook_tolerance_secs)
    }
}
