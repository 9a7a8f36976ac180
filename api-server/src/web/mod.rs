//! HTTP surface.
//!
//! Three independent POST endpoints plus a health check:
//! - `/api/contact`: CAPTCHA-checked contact form, emailed to the operator
//! - `/api/create-invoice`: builds and finalizes an invoice, emails the link
//! - `/api/webhooks/stripe`: signed payment events, thanks the payer
//!
//! Handlers share nothing but the long-lived clients in `AppState`.

pub mod contact;
pub mod invoice;
pub mod webhook;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::billing::BillingClient;
use crate::captcha::CaptchaVerifier;
use crate::error::method_not_allowed;
use crate::mail::MailSender;
use crate::Config;

pub use contact::{contact, ContactSubmission};
pub use invoice::{create_invoice, days_until_due, InvoiceRequest};
pub use webhook::stripe_webhook;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub mailer: Arc<dyn MailSender>,
    pub billing: Arc<dyn BillingClient>,
    pub captcha: Arc<dyn CaptchaVerifier>,
}

impl AppState {
    pub fn new(
        config: Config,
        mailer: Arc<dyn MailSender>,
        billing: Arc<dyn BillingClient>,
        captcha: Arc<dyn CaptchaVerifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            mailer,
            billing,
            captcha,
        }
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Build the router. Non-POST requests to the API routes get 405 with `Allow: POST`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/contact", post(contact).fallback(method_not_allowed))
        .route(
            "/api/create-invoice",
            post(create_invoice).fallback(method_not_allowed),
        )
        .route(
            "/api/webhooks/stripe",
            post(stripe_webhook).fallback(method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, HeaderMap, Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::billing::MockBillingClient;
    use crate::captcha::MockCaptchaVerifier;
    use crate::config::test_config;
    use crate::mail::MockMailSender;

    pub fn app(
        captcha: MockCaptchaVerifier,
        billing: MockBillingClient,
        mailer: MockMailSender,
    ) -> Router {
        router(AppState::new(
            test_config(),
            Arc::new(mailer),
            Arc::new(billing),
            Arc::new(captcha),
        ))
    }

    /// An app whose collaborators panic on any call.
    pub fn idle_app() -> Router {
        app(
            MockCaptchaVerifier::new(),
            MockBillingClient::new(),
            MockMailSender::new(),
        )
    }

    pub fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn call(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }
}
