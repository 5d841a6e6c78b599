//! Delivery channels.
//!
//! The string values must match the `channel` columns of the
//! `notifications`, `notification_preferences` and `notification_templates`
//! tables.

text_enum! {
    /// A delivery medium for a single notification record.
    pub enum Channel {
        /// Stored for the notification bell UI and pushed to connected clients.
        InApp => "IN_APP",
        /// Delivered via SMTP.
        Email => "EMAIL",
        Sms => "SMS",
        Push => "PUSH",
        Webhook => "WEBHOOK",
        /// Fire-and-forget real-time event, no stored inbox semantics.
        WebSocket => "WEBSOCKET",
    }
}

impl Channel {
    /// Channels that reach the user outside the application itself.
    ///
    /// Quiet hours and unsubscribe tokens only apply to these.
    pub fn is_out_of_band(&self) -> bool {
        !matches!(self, Channel::InApp | Channel::WebSocket)
    }
}
