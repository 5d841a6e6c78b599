//! Channel senders.
//!
//! Every delivery medium implements [`ChannelSender`]; the dispatcher looks
//! senders up in a [`SenderRegistry`] by [`Channel`] and never branches on
//! the channel itself. Senders report failures through [`DeliveryResult`]
//! instead of returning errors, so one pair can never abort its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mfgops_core::channels::Channel;
use mfgops_core::notification::{Notification, NotificationStatus};

use crate::bus::RealtimeBus;
use crate::store::Directory;

pub mod email;
pub mod in_app;
pub mod unsupported;
pub mod websocket;

pub use email::{EmailConfig, EmailSender};
pub use in_app::InAppSender;
pub use unsupported::UnsupportedSender;
pub use websocket::WebSocketSender;

// ---------------------------------------------------------------------------
// Result / context
// ---------------------------------------------------------------------------

/// Per-pair inputs that are not part of the stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryContext {
    /// Address from the recipient's preference settings, used instead of the
    /// directory lookup when present.
    pub contact_override: Option<String>,
}

/// Outcome of one channel send.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResult {
    pub success: bool,
    /// Status the record should move to.
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl DeliveryResult {
    /// Handed to the medium; delivery not confirmed.
    pub fn sent() -> Self {
        Self {
            success: true,
            status: NotificationStatus::Sent,
            error: None,
            delivered_at: Some(Utc::now()),
        }
    }

    /// Confirmed synchronously.
    pub fn delivered() -> Self {
        Self {
            success: true,
            status: NotificationStatus::Delivered,
            error: None,
            delivered_at: Some(Utc::now()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: NotificationStatus::Failed,
            error: Some(error.into()),
            delivered_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A delivery medium.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, notification: &Notification, ctx: &DeliveryContext) -> DeliveryResult;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Channel → sender lookup table.
#[derive(Default, Clone)]
pub struct SenderRegistry {
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` under its own channel, replacing any previous one.
    pub fn register(&mut self, sender: Arc<dyn ChannelSender>) {
        self.senders.insert(sender.channel(), sender);
    }

    pub fn with(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.register(sender);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(&channel).cloned()
    }

    /// The production set: in-app, WebSocket, email (possibly unconfigured)
    /// and failing placeholders for SMS, push and webhook.
    pub fn standard(
        bus: Arc<RealtimeBus>,
        directory: Arc<dyn Directory>,
        email: Option<EmailConfig>,
    ) -> Self {
        Self::new()
            .with(Arc::new(InAppSender::new(Arc::clone(&bus))))
            .with(Arc::new(WebSocketSender::new(bus)))
            .with(Arc::new(EmailSender::new(email, directory)))
            .with(Arc::new(UnsupportedSender::new(Channel::Sms)))
            .with(Arc::new(UnsupportedSender::new(Channel::Push)))
            .with(Arc::new(UnsupportedSender::new(Channel::Webhook)))
    }
}
