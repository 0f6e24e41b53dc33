// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay Service
//!
//! Receives contact-form posts and forwards them to one mailbox over SMTP.
//!
//! ## Endpoints
//!
//! - `GET /api/email/health`: SMTP relay connectivity
//! - `POST /api/email/send-contact`: submit `{userName, email, subject, message}`
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and `.env` if present):
//!
//! - `BIND_ADDR` / `PORT`: listen address (default: 0.0.0.0:5000)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_SECURE`, `SMTP_USER`, `SMTP_PASS`: relay
//! - `PERSONAL_EMAIL`: recipient of every submission
//! - `RATE_LIMIT_WINDOW_MS`: window length (default: 900000)
//! - `RATE_LIMIT_MAX_REQUESTS`: requests per window per IP (default: 5)
//! - `FRONTEND_URL`, `ALLOWED_ORIGINS`: CORS origins
//! - `APP_ENV`: `development` or `production` (default)
//!
//! The process exits before binding if the SMTP host, user, password or the
//! recipient is missing.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_relay::{
    config::{Config, Environment},
    routes, ContactHandler, ContactValidator, DeliveryClient, EmailRenderer, RateLimiter,
    SmtpTransport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Email configuration is incomplete")?;

    init_tracing(config.environment);
    info!(
        bind_addr = %config.bind_addr,
        smtp_host = %config.smtp.host,
        smtp_port = config.smtp.port,
        recipient = %config.recipient,
        window_ms = config.rate_limit.window_ms,
        max_requests = config.rate_limit.max_requests,
        allowed_origins = ?config.http.allowed_origins,
        environment = ?config.environment,
        "Starting contact relay"
    );

    // Create application state
    let transport = SmtpTransport::from_config(&config.smtp)?;
    let delivery = DeliveryClient::new(
        &config.smtp,
        &config.recipient,
        transport,
        EmailRenderer::new()?,
    )?;
    let handler = Arc::new(ContactHandler::new(
        ContactValidator::new(),
        delivery,
        config.http.health_timeout(),
        config.environment.expose_error_details(),
    ));
    let limiter = RateLimiter::new(config.rate_limit.clone());

    // Build router
    let app = routes::router(
        handler,
        limiter,
        &config.http,
        config.environment.expose_error_details(),
    );

    // Start server
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.bind_addr))?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// JSON logs in production, human-readable output in development.
fn init_tracing(environment: Environment) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    match environment {
        Environment::Production => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        Environment::Development => tracing_subscriber::registry()
            .with(fmt::layer().pretty())
            .with(filter)
            .init(),
    }
}
