// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared fixtures: a scriptable transport and a router wired around it.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, Response},
    Router,
};
use contact_relay::{
    config::{HttpConfig, RateLimitConfig, SmtpConfig},
    routes, ContactHandler, ContactValidator, DeliveryClient, EmailRenderer, MailTransport,
    RateLimiter,
};
use lettre::Message;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// How the stub answers `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendBehavior {
    #[default]
    Accept,
    Fail,
    Panic,
}

/// In-memory transport that records every message it is handed.
#[derive(Clone, Default)]
pub struct StubTransport {
    pub behavior: SendBehavior,
    pub connected: bool,
    pub sent: Arc<Mutex<Vec<Message>>>,
}

impl StubTransport {
    pub fn accepting() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            behavior: SendBehavior::Fail,
            ..Default::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            behavior: SendBehavior::Panic,
            ..Default::default()
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_sent_raw(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|m| String::from_utf8_lossy(&m.formatted()).into_owned())
    }
}

impl MailTransport for StubTransport {
    async fn send(&self, message: Message) -> anyhow::Result<()> {
        match self.behavior {
            SendBehavior::Accept => {
                self.sent.lock().unwrap().push(message);
                Ok(())
            }
            SendBehavior::Fail => Err(anyhow::anyhow!("Connection refused (os error 111)")),
            SendBehavior::Panic => panic!("transport exploded"),
        }
    }

    async fn test_connection(&self) -> anyhow::Result<bool> {
        if self.connected {
            Ok(true)
        } else {
            Err(anyhow::anyhow!("535 Authentication failed"))
        }
    }
}

pub const CLIENT_ADDR: ([u8; 4], u16) = ([203, 0, 113, 7], 40_000);

/// Router with the given transport and rate limit.
pub fn app(transport: StubTransport, rate_limit: RateLimitConfig) -> Router {
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
    let handler = Arc::new(ContactHandler::new(
        ContactValidator::new(),
        delivery,
        Duration::from_secs(1),
        false,
    ));

    routes::router(handler, RateLimiter::new(rate_limit), &HttpConfig::default(), false)
        .layer(MockConnectInfo(SocketAddr::from(CLIENT_ADDR)))
}

pub fn default_app(transport: StubTransport) -> Router {
    app(transport, RateLimitConfig::default())
}

pub fn valid_payload() -> Value {
    json!({
        "userName": "Jo",
        "email": "jo@x.co",
        "subject": "Hello there",
        "message": "This is a test message.",
    })
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Send one request and decode the JSON body.
pub async fn call(app: &Router, request: Request<Body>) -> (Response<()>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (Response::from_parts(parts, ()), json)
}
