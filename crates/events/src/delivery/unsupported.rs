//! Placeholder for channels without a transport.

use async_trait::async_trait;
use mfgops_core::channels::Channel;
use mfgops_core::notification::Notification;

use super::{ChannelSender, DeliveryContext, DeliveryResult};

/// Fails every send with a fixed reason naming the channel.
pub struct UnsupportedSender {
    channel: Channel,
}

impl UnsupportedSender {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelSender for UnsupportedSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, _notification: &Notification, _ctx: &DeliveryContext) -> DeliveryResult {
        DeliveryResult::failed(format!("{} delivery is not available", self.channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::test_support::notification;

    #[tokio::test]
    async fn fails_with_channel_name() {
        let result = UnsupportedSender::new(Channel::Sms)
            .send(&notification(Channel::Sms), &DeliveryContext::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("SMS delivery is not available"));
    }
}
