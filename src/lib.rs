// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay
//!
//! Accepts contact-form submissions over HTTP and relays them as email to a
//! single fixed recipient:
//!
//! - Fixed-window per-IP rate limiting (5 requests per 15 minutes default)
//! - Schema validation of the four form fields
//! - HTML and plain-text rendering with escaped user content
//! - SMTP delivery with a uniform success/failure outcome
//! - Health check against the SMTP relay

pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod renderer;
pub mod response;
pub mod routes;
pub mod validator;

pub use config::Config;
pub use delivery::{DeliveryClient, DeliveryOutcome, MailTransport, SmtpTransport};
pub use error::ContactError;
pub use handlers::ContactHandler;
pub use limiter::{RateLimitResult, RateLimiter};
pub use renderer::{EmailRenderer, RenderedEmail};
pub use response::ApiResponse;
pub use validator::{ContactSubmission, ContactValidator, ValidationError};
