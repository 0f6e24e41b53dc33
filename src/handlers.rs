// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact relay.
//!
//! [`ContactHandler`] runs validation, delivery and error mapping and returns
//! a status plus envelope. The axum functions below only adapt it to
//! requests and responses.

use crate::delivery::{DeliveryClient, MailTransport};
use crate::error::{self, ContactError};
use crate::response::ApiResponse;
use crate::validator::ContactValidator;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const SENT_RESPONSE: &str =
    "Your message has been sent successfully! I'll get back to you soon.";
pub const DELIVERY_FAILED: &str = "Email delivery failed";
pub const HEALTHY_MESSAGE: &str = "Email service is running";
pub const UNHEALTHY_MESSAGE: &str = "Email service health check failed";
pub const UNHEALTHY_ERROR: &str = "Service unavailable";

/// Payload of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitData {
    pub message_id: String,
}

/// Payload of a health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub email_service_connected: bool,
    pub timestamp: String,
}

/// Service description served at `/`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub health: &'static str,
    pub send_contact: &'static str,
}

/// Orchestrates one submission from raw payload to response.
pub struct ContactHandler<T> {
    validator: ContactValidator,
    delivery: DeliveryClient<T>,
    health_timeout: Duration,
    expose_error_details: bool,
}

impl<T: MailTransport> ContactHandler<T> {
    pub fn new(
        validator: ContactValidator,
        delivery: DeliveryClient<T>,
        health_timeout: Duration,
        expose_error_details: bool,
    ) -> Self {
        Self {
            validator,
            delivery,
            health_timeout,
            expose_error_details,
        }
    }

    /// Validate and deliver one submission.
    pub async fn submit(&self, raw: &Value) -> (StatusCode, ApiResponse<SubmitData>) {
        match self.try_submit(raw).await {
            Ok(response) => response,
            Err(err) => self.reject(err),
        }
    }

    async fn try_submit(&self, raw: &Value) -> error::Result<(StatusCode, ApiResponse<SubmitData>)> {
        let submission = self.validator.validate(raw)?;
        info!(
            email = %submission.email(),
            subject = %submission.subject(),
            "Contact form submission"
        );

        let outcome = self.delivery.send_contact(&submission).await?;
        let response = match outcome.message_id {
            Some(message_id) if outcome.success => (
                StatusCode::OK,
                ApiResponse::success(SENT_RESPONSE, SubmitData { message_id }),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::failure(outcome.message, DELIVERY_FAILED),
            ),
        };
        Ok(response)
    }

    /// Map an error to the client-facing envelope, logging by severity.
    pub fn reject<D>(&self, err: ContactError) -> (StatusCode, ApiResponse<D>) {
        match &err {
            ContactError::Validation(_) | ContactError::MalformedBody(_) => {
                debug!(error = %err, "Submission rejected")
            }
            ContactError::Internal(inner) => error!(error = ?inner, "Contact form error"),
        }
        err.status_and_body(self.expose_error_details)
    }

    /// Probe the relay, bounded by the configured timeout.
    pub async fn health_check(&self) -> (StatusCode, ApiResponse<HealthData>) {
        match tokio::time::timeout(self.health_timeout, self.delivery.verify_connectivity()).await
        {
            Ok(connected) => (
                StatusCode::OK,
                ApiResponse::success(
                    HEALTHY_MESSAGE,
                    HealthData {
                        email_service_connected: connected,
                        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    },
                ),
            ),
            Err(_) => {
                warn!(timeout = ?self.health_timeout, "Health check timed out");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiResponse::failure(UNHEALTHY_MESSAGE, UNHEALTHY_ERROR),
                )
            }
        }
    }
}

/// `POST /api/email/send-contact`
pub async fn send_contact<T: MailTransport>(
    State(handler): State<Arc<ContactHandler<T>>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let (status, body) = match payload {
        Ok(Json(raw)) => handler.submit(&raw).await,
        Err(rejection) => handler.reject(ContactError::MalformedBody(rejection.body_text())),
    };
    (status, Json(body)).into_response()
}

/// `GET /api/email/health`
pub async fn health<T: MailTransport>(State(handler): State<Arc<ContactHandler<T>>>) -> Response {
    let (status, body) = handler.health_check().await;
    (status, Json(body)).into_response()
}

/// `GET /`
pub async fn root() -> Json<ApiResponse<ServiceInfo>> {
    Json(ApiResponse::success(
        "Contact Relay API",
        ServiceInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            endpoints: Endpoints {
                health: "/api/email/health",
                send_contact: "POST /api/email/send-contact",
            },
        },
    ))
}

/// Fallback for unknown routes.
pub async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure(
            "Route not found",
            format!("Cannot {} {}", method, uri.path()),
        )),
    )
}

/// Response for a handler that panicked.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>, expose_details: bool) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Handler panicked");

    let err = ContactError::Internal(anyhow::anyhow!("handler panicked: {detail}"));
    let (status, body) = err.status_and_body::<()>(expose_details);
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpConfig;
    use crate::delivery::MockMailTransport;
    use crate::renderer::EmailRenderer;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn handler(transport: MockMailTransport) -> ContactHandler<MockMailTransport> {
        let smtp = SmtpConfig {
            user: "relay@example.com".to_string(),
            pass: "secret".to_string(),
            ..Default::default()
        };
        let delivery = DeliveryClient::new(
            &smtp,
            "me@example.com",
            transport,
            EmailRenderer::new().unwrap(),
        )
        .unwrap();
        ContactHandler::new(
            ContactValidator::new(),
            delivery,
            Duration::from_millis(100),
            false,
        )
    }

    fn valid_payload() -> Value {
        json!({
            "userName": "Jo",
            "email": "jo@x.co",
            "subject": "Hello there",
            "message": "This is a test message.",
        })
    }

    #[tokio::test]
    async fn test_submit_success() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .once()
            .return_once(|_| Box::pin(std::future::ready(Ok(()))));

        let (status, body) = handler(transport).submit(&valid_payload()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.message, SENT_RESPONSE);
        assert!(body.data.is_some());
        assert_eq!(body.error, None);
    }

    #[tokio::test]
    async fn test_submit_validation_failure_skips_delivery() {
        // No expectations: any send would panic the mock.
        let transport = MockMailTransport::new();

        let (status, body) = handler(transport)
            .submit(&json!({"userName": "J", "email": "bad", "subject": "Hi", "message": "short"}))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            ApiResponse::failure("Validation failed", "Name must be at least 2 characters long")
        );
    }

    #[tokio::test]
    async fn test_submit_delivery_failure() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .once()
            .return_once(|_| Box::pin(std::future::ready(Err(anyhow!("connection refused")))));

        let (status, body) = handler(transport).submit(&valid_payload()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            ApiResponse::failure(
                "Failed to send email. Please try again later.",
                DELIVERY_FAILED
            )
        );
    }

    #[tokio::test]
    async fn test_health_reports_connectivity() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_test_connection()
            .once()
            .return_once(|| Box::pin(std::future::ready(Ok(false))));

        let (status, body) = handler(transport).health_check().await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, HEALTHY_MESSAGE);
        let data = body.data.unwrap();
        assert!(!data.email_service_connected);
        assert!(chrono::DateTime::parse_from_rfc3339(&data.timestamp).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_timeout_is_unavailable() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_test_connection()
            .once()
            .return_once(|| Box::pin(std::future::pending::<anyhow::Result<bool>>()));

        let (status, body) = handler(transport).health_check().await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, ApiResponse::failure(UNHEALTHY_MESSAGE, UNHEALTHY_ERROR));
    }

    #[test]
    fn test_panic_response_sanitized() {
        let response = panic_response(Box::new("boom".to_string()), false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
