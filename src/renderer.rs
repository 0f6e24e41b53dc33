// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Email bodies for a contact submission.
//!
//! The HTML template is registered under a `.html` name, so tera escapes
//! every interpolated value. User-supplied markup is shown as text.

use crate::validator::ContactSubmission;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tera::{Context, Tera};

const HTML_TEMPLATE: (&str, &str) = (
    "contact.html",
    include_str!("../templates/contact.html"),
);
const TEXT_TEMPLATE: (&str, &str) = ("contact.txt", include_str!("../templates/contact.txt"));

/// Both bodies of the outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct EmailRenderer {
    tera: Arc<Tera>,
}

impl EmailRenderer {
    /// Compile the bundled templates.
    pub fn new() -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates([HTML_TEMPLATE, TEXT_TEMPLATE])?;
        Ok(Self { tera: tera.into() })
    }

    pub fn render(&self, submission: &ContactSubmission) -> anyhow::Result<RenderedEmail> {
        self.render_at(submission, Utc::now())
    }

    pub fn render_at(
        &self,
        submission: &ContactSubmission,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<RenderedEmail> {
        let mut context = Context::new();
        context.insert("userName", submission.user_name());
        context.insert("email", submission.email());
        context.insert("subject", submission.subject());
        context.insert("message", submission.message());
        context.insert(
            "generatedAt",
            &generated_at.format("%a, %d %b %Y %H:%M:%S UTC").to_string(),
        );

        Ok(RenderedEmail {
            html: self.tera.render(HTML_TEMPLATE.0, &context)?,
            text: self.tera.render(TEXT_TEMPLATE.0, &context)?,
        })
    }
}
