//! Real-time push without inbox semantics.

use std::sync::Arc;

use async_trait::async_trait;
use mfgops_core::channels::Channel;
use mfgops_core::notification::Notification;
use serde_json::json;

use super::{ChannelSender, DeliveryContext, DeliveryResult};
use crate::bus::{user_topic, RealtimeBus, RealtimeEvent};

pub const NOTIFICATION_PUSH: &str = "notification.push";

pub struct WebSocketSender {
    bus: Arc<RealtimeBus>,
}

impl WebSocketSender {
    pub fn new(bus: Arc<RealtimeBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl ChannelSender for WebSocketSender {
    fn channel(&self) -> Channel {
        Channel::WebSocket
    }

    /// Reports success as soon as the event is on the bus, whether or not
    /// the user is connected.
    async fn send(&self, notification: &Notification, _ctx: &DeliveryContext) -> DeliveryResult {
        self.bus.publish(RealtimeEvent::new(
            user_topic(&notification.user_id),
            NOTIFICATION_PUSH,
            json!({
                "id": notification.id,
                "type": notification.notification_type,
                "priority": notification.priority,
                "title": notification.title,
                "message": notification.message,
                "data": notification.data,
            }),
        ));
        DeliveryResult::sent()
    }
}
