//! Emailing search results to the traveler.
//!
//! Delivery never fails the conversation: [`Notifier::notify`] reports a
//! [`NotificationOutcome`] and the caller decides how to phrase it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flightdesk_core::config::MailConfig;
use flightdesk_core::{ApplicationError, MailCredentials, SecretError, SecretProvider};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{info, warn};

pub const SUBJECT: &str = "Your Flight Search Results ✈️";

const TEMPLATE_NAME: &str = "flight_results.txt";

/// What gets mailed: the reply text shown in the chat plus a booking link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightDetails {
    pub text: String,
    pub booking_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub sender: Mailbox,
    pub recipient: Mailbox,
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Failed(String),
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail credentials unavailable: {0}")]
    Credentials(#[from] SecretError),
    #[error("invalid address `{address}`: {reason}")]
    Address { address: String, reason: String },
    #[error("could not render email body: {0}")]
    Template(String),
    #[error("could not build email: {0}")]
    Build(String),
    #[error("smtp delivery failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, details: &FlightDetails) -> NotificationOutcome;
}

pub fn parse_recipient(recipient: &str) -> Result<Address, NotifyError> {
    recipient.trim().parse::<Address>().map_err(|error| NotifyError::Address {
        address: recipient.to_string(),
        reason: error.to_string(),
    })
}

/// STARTTLS submission through the configured relay, logging in with credentials read
/// from the secret provider on every send so rotations are honored.
pub struct SmtpNotifier {
    config: MailConfig,
    secrets: Arc<dyn SecretProvider>,
    templates: Tera,
}

impl SmtpNotifier {
    pub fn new(
        config: &MailConfig,
        secrets: Arc<dyn SecretProvider>,
    ) -> Result<Self, ApplicationError> {
        let mut templates = Tera::default();
        templates
            .add_raw_template(TEMPLATE_NAME, include_str!("../templates/flight_results.txt"))
            .map_err(|error| ApplicationError::Mail(format!("email template: {error}")))?;

        Ok(Self { config: config.clone(), secrets, templates })
    }

    pub fn compose(
        &self,
        sender: &Address,
        recipient: &str,
        details: &FlightDetails,
    ) -> Result<EmailMessage, NotifyError> {
        let recipient = Mailbox::new(None, parse_recipient(recipient)?);

        let mut context = Context::new();
        context.insert("sender_name", &self.config.sender_name);
        context.insert("text", &details.text);
        context.insert("booking_url", &details.booking_url);
        let body = self
            .templates
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| NotifyError::Template(error.to_string()))?;

        Ok(EmailMessage {
            sender: Mailbox::new(Some(self.config.sender_name.clone()), sender.clone()),
            recipient,
            subject: SUBJECT.to_string(),
            body,
        })
    }

    async fn deliver(&self, recipient: &str, details: &FlightDetails) -> Result<(), NotifyError> {
        let secret = self.secrets.fetch(&self.config.credentials_secret).await?;
        let credentials = MailCredentials::from_secret(&self.config.credentials_secret, &secret)?;
        let sender = parse_recipient(&credentials.email)?;

        let email = self.compose(&sender, recipient, details)?;
        let message = Message::builder()
            .from(email.sender)
            .to(email.recipient)
            .subject(email.subject)
            .multipart(MultiPart::mixed().singlepart(SinglePart::plain(email.body)))
            .map_err(|error| NotifyError::Build(error.to_string()))?;

        let relay = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .map_err(|error| NotifyError::Transport(error.to_string()))?;
        let transport = relay
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                credentials.email,
                credentials.password.expose_secret().to_string(),
            ))
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .build();

        transport
            .send(message)
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, recipient: &str, details: &FlightDetails) -> NotificationOutcome {
        match self.deliver(recipient, details).await {
            Ok(()) => {
                info!(
                    event_name = "notify.email.sent",
                    smtp_host = %self.config.smtp_host,
                    "flight results emailed"
                );
                NotificationOutcome::Sent
            }
            Err(error) => {
                warn!(
                    event_name = "notify.email.failed",
                    smtp_host = %self.config.smtp_host,
                    error = %error,
                    "flight results email was not delivered"
                );
                NotificationOutcome::Failed(error.to_string())
            }
        }
    }
}
