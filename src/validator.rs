// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact form validator.
//!
//! Checks the raw JSON payload against the single accepted form shape and
//! reports the first failing rule, in field order
//! userName → email → subject → message.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Validation error types. The `Display` text is sent to the client as is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("{0} is required")]
    Required(&'static str),

    #[error("{0} must be a string")]
    NotAString(&'static str),

    #[error("{field} must be at least {min} characters long")]
    TooShort { field: &'static str, min: usize },

    #[error("{field} must not exceed {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Please provide a valid email address")]
    InvalidEmail,

    #[error("\"{0}\" is not allowed")]
    UnknownField(String),
}

/// A submission that passed every rule. Fields are trimmed.
///
/// Only [`ContactValidator::validate`] constructs these, so anything holding
/// one has been validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    user_name: String,
    email: String,
    subject: String,
    message: String,
}

impl ContactSubmission {
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Length rule for one text field.
#[derive(Debug, Clone, Copy)]
struct FieldRule {
    key: &'static str,
    label: &'static str,
    min: usize,
    max: usize,
}

const USER_NAME: FieldRule = FieldRule {
    key: "userName",
    label: "Name",
    min: 2,
    max: 50,
};

const SUBJECT: FieldRule = FieldRule {
    key: "subject",
    label: "Subject",
    min: 5,
    max: 100,
};

const MESSAGE: FieldRule = FieldRule {
    key: "message",
    label: "Message",
    min: 10,
    max: 1000,
};

const EMAIL_KEY: &str = "email";
const EMAIL_LABEL: &str = "Email";

const KNOWN_FIELDS: [&str; 4] = [USER_NAME.key, EMAIL_KEY, SUBJECT.key, MESSAGE.key];

/// Contact form validator.
#[derive(Debug, Clone, Default)]
pub struct ContactValidator;

impl ContactValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a raw payload, returning the trimmed submission or the first
    /// violated rule.
    pub fn validate(&self, raw: &Value) -> Result<ContactSubmission, ValidationError> {
        let fields = raw.as_object().ok_or(ValidationError::NotAnObject)?;

        let user_name = text_field(fields, USER_NAME)?;
        let email = email_field(fields)?;
        let subject = text_field(fields, SUBJECT)?;
        let message = text_field(fields, MESSAGE)?;

        if let Some(unknown) = fields.keys().find(|k| !KNOWN_FIELDS.contains(&k.as_str())) {
            debug!(field = %unknown, "Unknown field in submission");
            return Err(ValidationError::UnknownField(unknown.clone()));
        }

        Ok(ContactSubmission {
            user_name,
            email,
            subject,
            message,
        })
    }
}

/// Fetch a required string field and trim it.
fn required_str<'a>(
    fields: &'a Map<String, Value>,
    key: &'static str,
    label: &'static str,
) -> Result<&'a str, ValidationError> {
    let value = match fields.get(key) {
        None | Some(Value::Null) => {
            debug!(field = key, "Missing field");
            return Err(ValidationError::Required(label));
        }
        Some(Value::String(s)) => s.trim(),
        Some(_) => {
            debug!(field = key, "Field is not a string");
            return Err(ValidationError::NotAString(label));
        }
    };

    if value.is_empty() {
        debug!(field = key, "Empty field");
        return Err(ValidationError::Required(label));
    }
    Ok(value)
}

fn text_field(fields: &Map<String, Value>, rule: FieldRule) -> Result<String, ValidationError> {
    let value = required_str(fields, rule.key, rule.label)?;
    let len = value.chars().count();

    if len < rule.min {
        debug!(field = rule.key, len, min = rule.min, "Field too short");
        return Err(ValidationError::TooShort {
            field: rule.label,
            min: rule.min,
        });
    }
    if len > rule.max {
        debug!(field = rule.key, len, max = rule.max, "Field too long");
        return Err(ValidationError::TooLong {
            field: rule.label,
            max: rule.max,
        });
    }
    Ok(value.to_string())
}

fn email_field(fields: &Map<String, Value>) -> Result<String, ValidationError> {
    let value = required_str(fields, EMAIL_KEY, EMAIL_LABEL)?;

    if !is_valid_email(value) {
        debug!(email = %value, "Invalid email address");
        return Err(ValidationError::InvalidEmail);
    }
    Ok(value.to_string())
}

/// Dot-atom address (no quoted local part) at a dotted hostname whose
/// top-level label is alphabetic.
pub fn is_valid_email(value: &str) -> bool {
    let Ok(address) = value.parse::<lettre::Address>() else {
        return false;
    };
    if address.user().contains('"') {
        return false;
    }

    let labels: Vec<&str> = address.domain().split('.').collect();
    let Some((tld, _)) = labels.split_last() else {
        return false;
    };

    labels.len() >= 2
        && labels.iter().all(|label| is_host_label(label))
        && tld.chars().count() >= 2
        && tld.chars().all(char::is_alphabetic)
}

fn is_host_label(label: &str) -> bool {
    !label.is_empty()
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_alphanumeric() || c == '-')
}
