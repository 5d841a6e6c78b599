//! In-app delivery.
//!
//! The stored record is the inbox entry, so delivery only needs to notify
//! connected clients. Always confirms synchronously.

use std::sync::Arc;

use async_trait::async_trait;
use mfgops_core::channels::Channel;
use mfgops_core::notification::Notification;

use super::{ChannelSender, DeliveryContext, DeliveryResult};
use crate::bus::{user_topic, RealtimeBus, RealtimeEvent};

/// Event name published for every new inbox entry.
pub const NOTIFICATION_CREATED: &str = "notification.created";

pub struct InAppSender {
    bus: Arc<RealtimeBus>,
}

impl InAppSender {
    pub fn new(bus: Arc<RealtimeBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl ChannelSender for InAppSender {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn send(&self, notification: &Notification, _ctx: &DeliveryContext) -> DeliveryResult {
        let result = DeliveryResult::delivered();

        // Clients see the record as it will be stored.
        let mut delivered = notification.clone();
        delivered.status = result.status;
        delivered.sent_at = result.delivered_at;

        let payload = match serde_json::to_value(&delivered) {
            Ok(payload) => payload,
            Err(e) => return DeliveryResult::failed(format!("Failed to encode notification: {e}")),
        };
        let receivers = self.bus.publish(RealtimeEvent::new(
            user_topic(&notification.user_id),
            NOTIFICATION_CREATED,
            payload,
        ));
        tracing::debug!(
            notification_id = notification.id,
            user_id = %notification.user_id,
            receivers,
            "In-app notification published"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::test_support::notification;
    use mfgops_core::notification::NotificationStatus;

    #[tokio::test]
    async fn publishes_to_user_topic_and_confirms() {
        let bus = Arc::new(RealtimeBus::default());
        let mut rx = bus.subscribe();
        let sender = InAppSender::new(Arc::clone(&bus));

        let result = sender.send(&notification(Channel::InApp), &DeliveryContext::default()).await;
        assert!(result.success);
        assert_eq!(result.status, NotificationStatus::Delivered);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "user:u1");
        assert_eq!(event.event, NOTIFICATION_CREATED);
        assert_eq!(event.payload["title"], "Order ORD-001 created");
        assert_eq!(event.payload["status"], "DELIVERED");
        assert!(event.payload["sentAt"].is_string());
    }

    #[tokio::test]
    async fn succeeds_without_subscribers() {
        let sender = InAppSender::new(Arc::new(RealtimeBus::default()));
        let result = sender.send(&notification(Channel::InApp), &DeliveryContext::default()).await;
        assert!(result.success);
    }
}
