//! Wintersmith.AI API server.
//!
//! Serves the contact, invoice and Stripe webhook endpoints. Outbound clients
//! are built once here and shared by every request.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wintersmith::{
    router, AppState, Config, MailSender, RecaptchaVerifier, SmtpMailer, StripeClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("api_server_starting");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        smtp_host = %config.smtp_host,
        smtp_port = config.smtp_port,
        stripe_api_base = %config.stripe_api_base,
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let mailer = SmtpMailer::from_config(&config).context("Failed to configure SMTP")?;
    match mailer.verify_connection().await {
        Ok(()) => info!("smtp_transport_ready"),
        Err(e) => warn!(error = %e, "smtp_verify_failed"),
    }

    let billing = StripeClient::new(
        http_client.clone(),
        config.stripe_api_base.clone(),
        config.stripe_secret_key.clone(),
        config.webhook_tolerance_secs,
    );
    let captcha = RecaptchaVerifier::new(http_client, config.recaptcha_verify_url.clone());

    let port = config.port;
    let state = AppState::new(
        config,
        Arc::new(mailer),
        Arc::new(billing),
        Arc::new(captcha),
    );

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "api_server_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("api_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("api_server_shutting_down");
}
