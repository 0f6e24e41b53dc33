// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SMTP delivery of contact submissions.
//!
//! [`DeliveryClient`] builds the outgoing message and sends it exactly once
//! through a [`MailTransport`]. Transport failures become a failed
//! [`DeliveryOutcome`]; their detail goes to the log only.

use crate::config::SmtpConfig;
use crate::error::Result;
use crate::renderer::EmailRenderer;
use crate::validator::ContactSubmission;
use anyhow::{anyhow, Context};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::future::Future;
use tracing::{debug, error, info};

pub const SENDER_NAME: &str = "Portfolio Contact Form";
pub const SUBJECT_PREFIX: &str = "Portfolio Contact: ";
pub const SENT_MESSAGE: &str = "Email sent successfully";
pub const FAILED_MESSAGE: &str = "Failed to send email. Please try again later.";

/// The SMTP session seen by the delivery client.
#[cfg_attr(test, mockall::automock)]
pub trait MailTransport: Send + Sync + 'static {
    /// Hand one message to the relay.
    fn send(&self, message: Message) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Connect and authenticate without sending anything.
    fn test_connection(&self) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

/// lettre's pooled async SMTP transport.
#[derive(Clone)]
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Implicit TLS when `secure` is set, STARTTLS otherwise. Certificates
    /// are always verified.
    pub fn from_config(config: &SmtpConfig) -> anyhow::Result<Self> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .with_context(|| format!("invalid SMTP host {:?}", config.host))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();

        Ok(Self { transport })
    }
}

impl MailTransport for SmtpTransport {
    async fn send(&self, message: Message) -> anyhow::Result<()> {
        let response = self.transport.send(message).await?;
        if !response.is_positive() {
            return Err(anyhow!("relay answered {}", response.code()));
        }
        Ok(())
    }

    async fn test_connection(&self) -> anyhow::Result<bool> {
        self.transport.test_connection().await.map_err(Into::into)
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub message: String,
    pub message_id: Option<String>,
}

impl DeliveryOutcome {
    fn sent(message_id: String) -> Self {
        Self {
            success: true,
            message: SENT_MESSAGE.to_string(),
            message_id: Some(message_id),
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            message: FAILED_MESSAGE.to_string(),
            message_id: None,
        }
    }
}

/// Sends contact submissions to the fixed recipient.
pub struct DeliveryClient<T> {
    transport: T,
    renderer: EmailRenderer,
    from: Mailbox,
    to: Mailbox,
    id_domain: String,
}

impl<T: MailTransport> DeliveryClient<T> {
    /// Addresses are parsed once here so a bad configuration fails at
    /// startup.
    pub fn new(
        config: &SmtpConfig,
        recipient: &str,
        transport: T,
        renderer: EmailRenderer,
    ) -> anyhow::Result<Self> {
        let sender: Address = config
            .user
            .trim()
            .parse()
            .with_context(|| format!("SMTP user {:?} is not an email address", config.user))?;
        let to: Mailbox = recipient
            .trim()
            .parse()
            .with_context(|| format!("recipient {recipient:?} is not an email address"))?;

        Ok(Self {
            transport,
            renderer,
            id_domain: sender.domain().to_string(),
            from: Mailbox::new(Some(SENDER_NAME.to_string()), sender),
            to,
        })
    }

    fn build_message(&self, submission: &ContactSubmission, message_id: &str) -> Result<Message> {
        let rendered = self
            .renderer
            .render(submission)
            .context("rendering contact email")?;
        let reply_to = Mailbox::new(
            None,
            submission
                .email()
                .parse::<Address>()
                .context("parsing reply-to address")?,
        );

        let message = Message::builder()
            .message_id(Some(message_id.to_string()))
            .from(self.from.clone())
            .to(self.to.clone())
            .reply_to(reply_to)
            .subject(format!("{SUBJECT_PREFIX}{}", submission.subject()))
            .multipart(MultiPart::alternative_plain_html(rendered.text, rendered.html))
            .context("building contact email")?;
        Ok(message)
    }

    /// Send the submission once. `Err` means the message could not be built;
    /// a relay failure is a failed outcome.
    pub async fn send_contact(&self, submission: &ContactSubmission) -> Result<DeliveryOutcome> {
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.id_domain);
        let message = self.build_message(submission, &message_id)?;

        debug!(message_id = %message_id, "Handing message to relay");
        match self.transport.send(message).await {
            Ok(()) => {
                info!(message_id = %message_id, "Contact email delivered");
                Ok(DeliveryOutcome::sent(message_id))
            }
            Err(err) => {
                error!(error = ?err, reply_to = %submission.email(), "Email sending error");
                Ok(DeliveryOutcome::failed())
            }
        }
    }

    /// Never fails: errors are logged and reported as `false`.
    pub async fn verify_connectivity(&self) -> bool {
        match self.transport.test_connection().await {
            Ok(connected) => connected,
            Err(err) => {
                error!(error = ?err, "Email connection verification failed");
                false
            }
        }
    }
}
