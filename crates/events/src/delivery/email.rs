//! Email delivery via SMTP.
//!
//! [`EmailSender`] wraps the `lettre` async SMTP transport and sends each
//! notification as a `multipart/alternative` message with a plain-text and
//! an HTML body. Configuration is loaded from environment variables; if
//! `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None` and every
//! send fails with a configuration error instead of reaching the network.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use mfgops_core::channels::Channel;
use mfgops_core::notification::Notification;

use super::{ChannelSender, DeliveryContext, DeliveryResult};
use crate::store::Directory;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    #[error("Email transport is not configured")]
    NotConfigured,

    #[error("No email address for user {0}")]
    NoAddress(String),

    #[error("Directory lookup failed: {0}")]
    Directory(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@mfgops.local";

/// Configuration for the SMTP transport.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, meaning email delivery is
    /// not configured.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      |                         |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `noreply@mfgops.local`  |
    /// | `SMTP_USER`     | no       |                         |
    /// | `SMTP_PASSWORD` | no       |                         |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp_host)?
            .port(self.smtp_port);
        if let (Some(user), Some(pass)) = (&self.smtp_user, &self.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(builder.build())
    }
}

// ---------------------------------------------------------------------------
// Body formatting
// ---------------------------------------------------------------------------

fn action_url(notification: &Notification) -> Option<&str> {
    notification
        .metadata
        .as_ref()
        .and_then(|m| m.action_url.as_deref())
}

/// Plain-text alternative.
pub fn render_plain(notification: &Notification) -> String {
    let mut body = format!("{}\n\n{}\n", notification.title, notification.message);
    if let Some(url) = action_url(notification) {
        body.push_str(&format!("\nOpen: {url}\n"));
    }
    body
}

/// HTML alternative. Every interpolated value is escaped.
pub fn render_html(notification: &Notification) -> String {
    let mut body = format!(
        "<!DOCTYPE html><html><body style=\"font-family:sans-serif\">\
         <h2>{}</h2><p>{}</p>",
        escape_html(&notification.title),
        escape_html(&notification.message).replace('\n', "<br>"),
    );
    if let Some(url) = action_url(notification) {
        body.push_str(&format!("<p><a href=\"{}\">Open</a></p>", escape_html(url)));
    }
    body.push_str("</body></html>");
    body
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// EmailSender
// ---------------------------------------------------------------------------

struct Transport {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

/// Sends notification emails via SMTP.
pub struct EmailSender {
    transport: Option<Transport>,
    directory: Arc<dyn Directory>,
}

impl EmailSender {
    /// Build the sender. The SMTP transport is created once here; a missing
    /// or unusable configuration leaves the sender unconfigured.
    pub fn new(config: Option<EmailConfig>, directory: Arc<dyn Directory>) -> Self {
        let transport = config.and_then(|config| match config.build_transport() {
            Ok(mailer) => Some(Transport { config, mailer }),
            Err(e) => {
                tracing::warn!(error = %e, host = %config.smtp_host, "Invalid SMTP configuration, email disabled");
                None
            }
        });
        Self {
            transport,
            directory,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    async fn recipient(&self, notification: &Notification, ctx: &DeliveryContext) -> Result<String, EmailError> {
        if let Some(address) = &ctx.contact_override {
            return Ok(address.clone());
        }
        self.directory
            .email_address_of(&notification.user_id)
            .await
            .map_err(|e| EmailError::Directory(e.to_string()))?
            .ok_or_else(|| EmailError::NoAddress(notification.user_id.clone()))
    }

    /// Send one notification email.
    pub async fn deliver(&self, notification: &Notification, ctx: &DeliveryContext) -> Result<(), EmailError> {
        let to = self.recipient(notification, ctx).await?;
        let mailbox: Mailbox = to.parse()?;
        let transport = self.transport.as_ref().ok_or(EmailError::NotConfigured)?;

        let email = Message::builder()
            .from(transport.config.from_address.parse()?)
            .to(mailbox)
            .subject(notification.title.clone())
            .multipart(MultiPart::alternative_plain_html(
                render_plain(notification),
                render_html(notification),
            ))
            .map_err(|e| EmailError::Build(e.to_string()))?;

        transport.mailer.send(email).await?;

        tracing::info!(
            notification_id = notification.id,
            to = %to,
            notification_type = %notification.notification_type,
            "Notification email sent"
        );
        Ok(())
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, notification: &Notification, ctx: &DeliveryContext) -> DeliveryResult {
        match self.deliver(notification, ctx).await {
            Ok(()) => DeliveryResult::sent(),
            Err(e) => DeliveryResult::failed(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
