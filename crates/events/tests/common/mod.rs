#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mfgops_core::channels::Channel;
use mfgops_core::notification::{Notification, NotificationStatus, NotificationType, Priority};
use mfgops_core::preference::PreferenceUpsert;
use mfgops_core::types::DbId;
use mfgops_events::delivery::{
    ChannelSender, DeliveryContext, DeliveryResult, InAppSender, SenderRegistry, UnsupportedSender,
    WebSocketSender,
};
use mfgops_events::store::{
    MemoryNotificationStore, MemoryPreferenceStore, MemoryTemplateStore, PreferenceStore, StaticDirectory,
};
use mfgops_events::{Engine, EngineConfig, RealtimeBus, Stores};

pub const TENANT: &str = "t1";

/// Engine over in-memory stores with handles to the concrete stores.
pub struct Harness {
    pub engine: Engine,
    pub notifications: Arc<MemoryNotificationStore>,
    pub preferences: Arc<MemoryPreferenceStore>,
    pub templates: Arc<MemoryTemplateStore>,
    pub directory: Arc<StaticDirectory>,
    pub bus: Arc<RealtimeBus>,
    pub email: Arc<ScriptedSender>,
}

/// Harness whose email channel is a [`ScriptedSender`] that succeeds.
pub fn harness() -> Harness {
    harness_with(EngineConfig::default(), ScriptedSender::ok(Channel::Email))
}

pub fn harness_with(config: EngineConfig, email: ScriptedSender) -> Harness {
    let notifications = Arc::new(MemoryNotificationStore::new());
    let preferences = Arc::new(MemoryPreferenceStore::new());
    let templates = Arc::new(MemoryTemplateStore::new());
    let directory = Arc::new(
        StaticDirectory::new()
            .with_role(TENANT, "supervisor", &["u2", "u3"])
            .with_email("u1", "u1@plant.example"),
    );
    let bus = Arc::new(RealtimeBus::default());
    let email = Arc::new(email);

    let senders = SenderRegistry::new()
        .with(Arc::new(InAppSender::new(Arc::clone(&bus))))
        .with(Arc::new(WebSocketSender::new(Arc::clone(&bus))))
        .with(email.clone())
        .with(Arc::new(UnsupportedSender::new(Channel::Sms)));

    let stores = Stores {
        notifications: notifications.clone(),
        preferences: preferences.clone(),
        templates: templates.clone(),
        directory: directory.clone(),
    };
    let engine = Engine::with_senders(stores, config, senders, Arc::clone(&bus));

    Harness {
        engine,
        notifications,
        preferences,
        templates,
        directory,
        bus,
        email,
    }
}

impl Harness {
    pub async fn set_pref(&self, user: &str, t: NotificationType, channel: Channel, enabled: bool) {
        self.preferences
            .upsert(user, TENANT, &PreferenceUpsert::new(t, channel, enabled))
            .await
            .unwrap();
    }

    pub async fn enable(&self, user: &str, t: NotificationType, channels: &[Channel]) {
        for c in channels {
            self.set_pref(user, t, *c, true).await;
        }
    }

    pub async fn status_of(&self, id: DbId) -> NotificationStatus {
        self.notifications
            .all()
            .into_iter()
            .find(|n| n.id == id)
            .map(|n| n.status)
            .expect("record exists")
    }
}

/// Sender with a scripted outcome, an optional delay and a call counter.
pub struct ScriptedSender {
    channel: Channel,
    outcome: Result<NotificationStatus, String>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl ScriptedSender {
    pub fn ok(channel: Channel) -> Self {
        Self {
            channel,
            outcome: Ok(NotificationStatus::Sent),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(channel: Channel, error: &str) -> Self {
        Self {
            outcome: Err(error.to_string()),
            ..Self::ok(channel)
        }
    }

    pub fn slow(channel: Channel, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok(channel)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSender for ScriptedSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, _notification: &Notification, _ctx: &DeliveryContext) -> DeliveryResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            Ok(NotificationStatus::Delivered) => DeliveryResult::delivered(),
            Ok(_) => DeliveryResult::sent(),
            Err(e) => DeliveryResult::failed(e.clone()),
        }
    }
}

/// A stored record fixture.
pub fn record(id: DbId, channel: Channel, status: NotificationStatus) -> Notification {
    Notification {
        id,
        tenant_id: TENANT.into(),
        user_id: "u1".into(),
        notification_type: NotificationType::TaskOverdue,
        channel,
        priority: Priority::Medium,
        status,
        title: "Task overdue".into(),
        message: "Task T-1 is overdue".into(),
        data: None,
        metadata: None,
        template_id: None,
        group_id: None,
        scheduled_for: None,
        sent_at: None,
        read_at: None,
        acknowledged_at: None,
        expires_at: None,
        retry_count: 0,
        last_error: None,
        actions: None,
        created_at: Utc::now(),
    }
}
