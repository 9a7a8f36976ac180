//! Configuration module for environment variable parsing.
//!
//! All configuration is read once at startup. Missing required values are a
//! hard error so the process never starts half-configured.

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default reCAPTCHA verification endpoint.
pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Default Stripe REST API base.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1/";

/// Display name used in the `From` header when none is configured.
pub const DEFAULT_FROM_NAME: &str = "Wintersmith.AI";

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// SMTP relay host
    pub smtp_host: String,

    /// SMTP relay port (465 = implicit TLS, anything else = STARTTLS)
    pub smtp_port: u16,

    /// SMTP username, also used as the sender address
    pub smtp_user: String,

    /// SMTP password
    pub smtp_pass: String,

    /// Display name for outgoing mail
    pub mail_from_name: String,

    /// Where contact form submissions are delivered
    pub contact_notify_address: String,

    /// reCAPTCHA secret key
    pub recaptcha_secret: String,

    /// reCAPTCHA verification endpoint
    pub recaptcha_verify_url: Url,

    /// Stripe secret API key
    pub stripe_secret_key: String,

    /// Stripe webhook endpoint signing secret
    pub stripe_webhook_secret: String,

    /// Stripe REST API base URL
    pub stripe_api_base: Url,

    /// Maximum accepted age of a webhook signature timestamp
    pub webhook_tolerance_secs: u64,

    /// Timeout applied to every outbound call (HTTP and SMTP)
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        Ok(Config {
            port: vars.parsed("PORT", 8080)?,
            smtp_host: vars.required("SMTP_HOST")?,
            smtp_port: vars.parsed("SMTP_PORT", 587)?,
            smtp_user: vars.required("SMTP_USER")?,
            smtp_pass: vars.required("SMTP_PASS")?,
            mail_from_name: vars
                .optional("MAIL_FROM_NAME")
                .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            contact_notify_address: vars.required("CONTACT_NOTIFY_ADDRESS")?,
            recaptcha_secret: vars.required("RECAPTCHA_SECRET_KEY")?,
            recaptcha_verify_url: vars.url("RECAPTCHA_VERIFY_URL", RECAPTCHA_VERIFY_URL)?,
            stripe_secret_key: vars.required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: vars.required("STRIPE_WEBHOOK_SECRET")?,
            stripe_api_base: vars.base_url("STRIPE_API_BASE", STRIPE_API_BASE)?,
            webhook_tolerance_secs: vars.parsed("STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
            request_timeout_ms: vars.parsed("REQUEST_TIMEOUT_MS", 10_000)?,
        })
    }

    /// Sender mailbox for every outgoing message, e.g. `"Wintersmith.AI" <bot@example.com>`.
    pub fn sender(&self) -> String {
        format!("\"{}\" <{}>", self.mail_from_name, self.smtp_user)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value: raw }),
        }
    }

    fn url(&self, name: &'static str, default: &str) -> Result<Url, ConfigError> {
        let raw = self.optional(name).unwrap_or_else(|| default.to_string());
        Url::parse(&raw).map_err(|_| ConfigError::Invalid { name, value: raw })
    }

    /// Base URLs are joined with relative paths, so they need a trailing slash.
    fn base_url(&self, name: &'static str, default: &str) -> Result<Url, ConfigError> {
        let mut url = self.url(name, default)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        port: 8080,
        smtp_host: "smtp.example.com".to_string(),
        smtp_port: 587,
        smtp_user: "mailer@wintersmith.test".to_string(),
        smtp_pass: "secret".to_string(),
        mail_from_name: DEFAULT_FROM_NAME.to_string(),
        contact_notify_address: "ops@wintersmith.test".to_string(),
        recaptcha_secret: "captcha-secret".to_string(),
        recaptcha_verify_url: Url::parse(RECAPTCHA_VERIFY_URL).unwrap(),
        stripe_secret_key: "sk_test_123".to_string(),
        stripe_webhook_secret: "whsec_test".to_string(),
        stripe_api_base: Url::parse(STRIPE_API_BASE).unwrap(),
        webhook_tolerance_secs: 300,
        request_timeout_ms: 10_000,
    }
}
