// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the contact relay.
//!
//! A [`ContactError`] carries full detail for the logs. Clients only ever
//! see the [`ApiResponse`] produced by [`ContactError::status_and_body`].

use crate::response::ApiResponse;
use crate::validator::ValidationError;
use axum::http::StatusCode;
use thiserror::Error;

pub const VALIDATION_FAILED: &str = "Validation failed";
pub const INTERNAL_MESSAGE: &str = "Failed to send message. Please try again later.";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Application error types
#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ContactError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing form. Internal detail is included only when
    /// `expose_details` is set.
    pub fn status_and_body<T>(&self, expose_details: bool) -> (StatusCode, ApiResponse<T>) {
        let body = match self {
            Self::Validation(err) => ApiResponse::failure(VALIDATION_FAILED, err.to_string()),
            Self::MalformedBody(reason) => ApiResponse::failure(VALIDATION_FAILED, reason.clone()),
            Self::Internal(err) if expose_details => {
                ApiResponse::failure(INTERNAL_MESSAGE, format!("{err:#}"))
            }
            Self::Internal(_) => ApiResponse::failure(INTERNAL_MESSAGE, INTERNAL_ERROR),
        };
        (self.status(), body)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ContactError>;
