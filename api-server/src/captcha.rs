//! reCAPTCHA token verification.
//!
//! Reference: https://developers.google.com/recaptcha/docs/verify

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("captcha request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("captcha endpoint returned status {0}")]
    Status(u16),
}

/// Confirms that a form submission was made by a human.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Returns whether the provider reported success for `token`.
    async fn verify(&self, secret: &str, token: &str) -> Result<bool, CaptchaError>;
}

/// Response body of the siteverify endpoint.
#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Google reCAPTCHA verifier over HTTPS.
#[derive(Clone)]
pub struct RecaptchaVerifier {
    client: Client,
    verify_url: Url,
}

impl RecaptchaVerifier {
    pub fn new(client: Client, verify_url: Url) -> Self {
        Self { client, verify_url }
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, secret: &str, token: &str) -> Result<bool, CaptchaError> {
        if token.is_empty() {
            warn!("captcha_token_missing");
            return Ok(false);
        }

        let response = self
            .client
            .post(self.verify_url.clone())
            .form(&[("secret", secret), ("response", token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status_code = status.as_u16(), "captcha_endpoint_error");
            return Err(CaptchaError::Status(status.as_u16()));
        }

        let body: SiteVerifyResponse = response.json().await?;

        if body.success {
            info!("captcha_verified");
        } else {
            warn!(error_codes = ?body.error_codes, "captcha_rejected");
        }

        Ok(body.success)
    }
}
