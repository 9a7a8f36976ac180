//! Contact form endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::AppState;
use crate::error::ApiError;
use crate::mail::templates;

/// Contact form payload as posted by the site.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub journey: String,
    #[serde(default)]
    pub referral: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub comments: Option<String>,
    /// reCAPTCHA response token from the browser.
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
}

/// Contact form endpoint.
///
/// 1. Verifies the reCAPTCHA token
/// 2. Emails the submission to the operator
pub async fn contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Result<Json<ContactResponse>, ApiError> {
    let Json(submission) = payload.map_err(|e| {
        warn!(error = %e, "contact_payload_invalid");
        ApiError::from(e)
    })?;

    info!(
        email = %submission.email,
        services = submission.services.len(),
        has_comments = submission.comments.is_some(),
        "contact_received"
    );

    let verified = match state
        .captcha
        .verify(&state.config.recaptcha_secret, &submission.token)
        .await
    {
        Ok(success) => success,
        Err(e) => {
            warn!(error = %e, "contact_captcha_unavailable");
            false
        }
    };

    if !verified {
        warn!(email = %submission.email, "contact_captcha_failed");
        return Err(ApiError::Validation(
            "reCAPTCHA verification failed".to_string(),
        ));
    }

    let message = templates::contact_notification(&submission)
        .into_message(state.config.sender(), &state.config.contact_notify_address);

    if let Err(e) = state.mailer.send(message).await {
        error!(error = %e, email = %submission.email, "contact_mail_failed");
        return Err(ApiError::Delivery("Email delivery failed".to_string()));
    }

    info!(email = %submission.email, "contact_delivered");

    Ok(Json(ContactResponse { success: true }))
}
