mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use mfgops_core::channels::Channel;
use mfgops_core::error::CoreError;
use mfgops_core::notification::{NotificationStatus, NotificationType, Priority};
use mfgops_core::payload::{EventPayload, OrderEvent};
use mfgops_core::template::{TemplateVariable, VariableType};
use mfgops_core::templates::NewTemplate;
use mfgops_events::{EngineConfig, NotifyError, SendRequest};
use serde_json::{json, Map, Value};

use common::{harness, harness_with, ScriptedSender, TENANT};

fn order_created() -> SendRequest {
    SendRequest::new(TENANT, NotificationType::OrderCreated).with_content("Order created", "ORD-001 was created")
}

fn template_data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn email_and_in_app_both_enabled_create_two_records() {
    let h = harness();
    h.enable("u1", NotificationType::OrderCreated, &[Channel::Email, Channel::InApp])
        .await;

    let batch = h
        .engine
        .send(&order_created().to(&["u1"]).via(&[Channel::Email, Channel::InApp]))
        .await
        .unwrap();

    assert_eq!(batch.total, 2);
    assert_eq!(batch.success_count, 2);
    assert_eq!(batch.failure_count, 0);
    assert_eq!(batch.results[0].channel, Channel::Email);
    assert_eq!(batch.results[0].status, NotificationStatus::Sent);
    assert_eq!(batch.results[1].channel, Channel::InApp);
    assert_eq!(batch.results[1].status, NotificationStatus::Delivered);

    let stored = h.notifications.all();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|n| n.sent_at.is_some()));
}

#[tokio::test]
async fn disabled_preference_creates_nothing() {
    let h = harness();
    h.set_pref("u1", NotificationType::OrderCreated, Channel::Email, false).await;

    let batch = h
        .engine
        .send(&order_created().to(&["u1"]).via(&[Channel::Email]))
        .await
        .unwrap();

    assert_eq!((batch.total, batch.success_count, batch.failure_count), (0, 0, 0));
    assert!(batch.results.is_empty());
    assert!(h.notifications.all().is_empty());
    assert_eq!(h.email.call_count(), 0);
}

#[tokio::test]
async fn missing_preference_is_denied_by_default() {
    let h = harness();
    let batch = h.engine.send(&order_created().to(&["u1"])).await.unwrap();
    assert_eq!(batch.total, 0);
    assert!(h.notifications.all().is_empty());
}

#[tokio::test]
async fn template_content_is_rendered() {
    let h = harness();
    h.enable("u1", NotificationType::OrderCreated, &[Channel::InApp]).await;
    h.engine
        .templates
        .create(
            TENANT,
            &NewTemplate {
                id: Some("tpl-order-created".into()),
                code: "order_created".into(),
                name: "Order created".into(),
                notification_type: NotificationType::OrderCreated,
                channel: Channel::InApp,
                subject: "Order {{orderNumber}}".into(),
                body: "Order {{orderNumber}} for {{customerName}}".into(),
                variables: vec![
                    TemplateVariable::required("orderNumber", VariableType::String),
                    TemplateVariable::optional("customerName", VariableType::String, Some(json!("unknown"))),
                ],
                is_active: true,
                styling: None,
                metadata: None,
            },
        )
        .await
        .unwrap();

    let request = SendRequest::new(TENANT, NotificationType::OrderCreated)
        .to(&["u1"])
        .with_template("tpl-order-created", template_data(json!({"orderNumber": "ORD-001"})));
    let batch = h.engine.send(&request).await.unwrap();

    assert_eq!(batch.success_count, 1);
    let stored = &h.notifications.all()[0];
    assert_eq!(stored.title, "Order ORD-001");
    assert_eq!(stored.message, "Order ORD-001 for unknown");
    assert_eq!(stored.template_id.as_deref(), Some("tpl-order-created"));
}

#[tokio::test]
async fn payload_fields_feed_templates_and_metadata() {
    let h = harness();
    h.enable("u1", NotificationType::OrderCreated, &[Channel::InApp]).await;
    h.engine.templates.seed_defaults(TENANT).await.unwrap();
    let template = h.engine.templates.get_by_code(TENANT, "order_created").await.unwrap();

    let request = SendRequest::new(TENANT, NotificationType::OrderCreated)
        .to(&["u1"])
        .with_template(&template.id, Map::new())
        .with_payload(EventPayload::Order(OrderEvent {
            order_id: "o-1".into(),
            order_number: "ORD-042".into(),
            customer_name: Some("Acme".into()),
            due_date: None,
            delay_reason: None,
            total_amount: None,
        }));
    h.engine.send(&request).await.unwrap();

    let stored = &h.notifications.all()[0];
    assert!(stored.title.contains("ORD-042"), "title was {:?}", stored.title);
    let metadata = stored.metadata.as_ref().unwrap();
    assert_eq!(metadata.entity_type.as_deref(), Some("order"));
    assert_eq!(metadata.entity_id.as_deref(), Some("o-1"));
    assert_eq!(metadata.category.as_deref(), Some("order"));
    assert_eq!(stored.data.as_ref().unwrap()["orderNumber"], "ORD-042");
}

#[tokio::test]
async fn unknown_template_aborts_the_whole_send() {
    let h = harness();
    h.enable("u1", NotificationType::OrderCreated, &[Channel::InApp]).await;

    let request = SendRequest::new(TENANT, NotificationType::OrderCreated)
        .to(&["u1"])
        .with_template("tpl-missing", Map::new());
    let err = h.engine.send(&request).await.unwrap_err();

    assert_matches!(err, NotifyError::Core(CoreError::NotFound { .. }));
    assert!(h.notifications.all().is_empty());
}

#[tokio::test]
async fn unsupported_channel_fails_only_its_pair() {
    let h = harness();
    h.enable("u1", NotificationType::OrderCreated, &[Channel::InApp, Channel::Sms, Channel::Push])
        .await;

    let batch = h
        .engine
        .send(&order_created().to(&["u1"]).via(&[Channel::Sms, Channel::InApp, Channel::Push]))
        .await
        .unwrap();

    assert_eq!(batch.total, 3);
    assert_eq!(batch.success_count, 1);
    assert_eq!(batch.failure_count, 2);
    assert_eq!(batch.results[0].error.as_deref(), Some("SMS delivery is not available"));
    assert!(batch.results[1].success);
    // No sender registered for push in the harness.
    assert_eq!(
        batch.results[2].error.as_deref(),
        Some("No sender registered for channel PUSH")
    );

    let sms = h
        .notifications
        .all()
        .into_iter()
        .find(|n| n.channel == Channel::Sms)
        .unwrap();
    assert_eq!(sms.status, NotificationStatus::Failed);
    assert_eq!(sms.last_error.as_deref(), Some("SMS delivery is not available"));
    assert_eq!(sms.retry_count, 0);
}

#[tokio::test]
async fn recipients_are_deduplicated_across_roles() {
    let h = harness();
    for user in ["u1", "u2", "u3"] {
        h.enable(user, NotificationType::EquipmentBreakdown, &[Channel::InApp]).await;
    }

    let request = SendRequest::new(TENANT, NotificationType::EquipmentBreakdown)
        .to(&["u2", "u1", "u2"])
        .to_roles(&["supervisor"])
        .via(&[Channel::InApp, Channel::InApp])
        .with_content("Press 4 down", "Hydraulic failure");
    let batch = h.engine.send(&request).await.unwrap();

    let users: Vec<&str> = batch.results.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(users, vec!["u2", "u1", "u3"]);
    assert_eq!(h.notifications.all().len(), 3);
}

#[tokio::test]
async fn slow_channel_times_out_without_blocking_siblings() {
    let config = EngineConfig {
        send_timeout: Duration::from_millis(50),
        ..EngineConfig::default()
    };
    let h = harness_with(config, ScriptedSender::slow(Channel::Email, Duration::from_secs(5)));
    h.enable("u1", NotificationType::OrderCreated, &[Channel::Email, Channel::InApp])
        .await;

    let batch = h
        .engine
        .send(&order_created().to(&["u1"]).via(&[Channel::Email, Channel::InApp]))
        .await
        .unwrap();

    assert_eq!(batch.failure_count, 1);
    assert!(batch.results[0].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(batch.results[1].status, NotificationStatus::Delivered);
}

#[tokio::test]
async fn failing_email_is_recorded_as_failed() {
    let h = harness_with(EngineConfig::default(), ScriptedSender::failing(Channel::Email, "SMTP down"));
    h.enable("u1", NotificationType::OrderCreated, &[Channel::Email]).await;

    let batch = h
        .engine
        .send(&order_created().to(&["u1"]).via(&[Channel::Email]))
        .await
        .unwrap();

    assert_eq!(batch.failure_count, 1);
    let id = batch.results[0].notification_id.unwrap();
    assert_eq!(h.status_of(id).await, NotificationStatus::Failed);
}

#[tokio::test]
async fn preference_store_failure_counts_as_pair_failure() {
    let h = harness();
    h.preferences.set_unavailable(true);

    let batch = h.engine.send(&order_created().to(&["u1"])).await.unwrap();

    assert_eq!((batch.total, batch.failure_count), (1, 1));
    assert!(batch.results[0].notification_id.is_none());
    assert!(h.notifications.all().is_empty());
}

#[tokio::test]
async fn future_schedule_queues_every_channel() {
    let h = harness();
    h.enable("u1", NotificationType::OrderCreated, &[Channel::InApp, Channel::Email])
        .await;

    let at = Utc::now() + chrono::Duration::hours(2);
    let batch = h
        .engine
        .send(&order_created().to(&["u1"]).via(&[Channel::InApp, Channel::Email]).scheduled_for(at))
        .await
        .unwrap();

    assert_eq!(batch.success_count, 2);
    assert!(batch.results.iter().all(|r| r.status == NotificationStatus::Queued));
    assert!(h.notifications.all().iter().all(|n| n.scheduled_for == Some(at)));
    assert_eq!(h.email.call_count(), 0);
}

#[tokio::test]
async fn quiet_hours_defer_email_but_not_critical() {
    let h = harness();
    h.enable("u1", NotificationType::OrderDelayed, &[Channel::Email]).await;
    let now = Utc::now();
    let start = (now - chrono::Duration::hours(1)).format("%H:%M").to_string();
    let end = (now + chrono::Duration::hours(1)).format("%H:%M").to_string();
    let mut patch = Map::new();
    patch.insert("quietHours".into(), json!({"start": start, "end": end, "timezone": "UTC"}));
    h.engine
        .preferences
        .update_channel_settings("u1", TENANT, Channel::Email, &patch)
        .await
        .unwrap();

    let request = SendRequest::new(TENANT, NotificationType::OrderDelayed)
        .to(&["u1"])
        .via(&[Channel::Email])
        .with_content("Order delayed", "ORD-001 slipped");
    let deferred = h.engine.send(&request).await.unwrap();
    assert_eq!(deferred.results[0].status, NotificationStatus::Queued);
    assert_eq!(h.email.call_count(), 0);

    let urgent = h.engine.send(&request.with_priority(Priority::Critical)).await.unwrap();
    assert_eq!(urgent.results[0].status, NotificationStatus::Sent);
    assert_eq!(h.email.call_count(), 1);
}

#[tokio::test]
async fn in_app_delivery_reaches_the_bus() {
    let h = harness();
    h.enable("u1", NotificationType::OrderCreated, &[Channel::InApp]).await;
    let mut rx = h.bus.subscribe();

    h.engine.send(&order_created().to(&["u1"])).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.user_id(), Some("u1"));
    assert_eq!(event.event, "notification.created");
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let h = harness();
    let no_recipients = order_created();
    assert_matches!(
        h.engine.send(&no_recipients).await,
        Err(NotifyError::Core(CoreError::Validation(_)))
    );

    let no_content = SendRequest::new(TENANT, NotificationType::OrderCreated).to(&["u1"]);
    assert_matches!(
        h.engine.send(&no_content).await,
        Err(NotifyError::Core(CoreError::Validation(_)))
    );

    let no_tenant = SendRequest::new("", NotificationType::OrderCreated)
        .to(&["u1"])
        .with_content("a", "b");
    assert!(h.engine.send(&no_tenant).await.is_err());
}

#[tokio::test]
async fn counts_always_add_up() {
    let h = harness_with(EngineConfig::default(), ScriptedSender::failing(Channel::Email, "down"));
    for user in ["u1", "u2", "u3"] {
        h.enable(user, NotificationType::TaskAssigned, &[Channel::InApp, Channel::Email])
            .await;
    }
    h.set_pref("u3", NotificationType::TaskAssigned, Channel::Email, false).await;

    let request = SendRequest::new(TENANT, NotificationType::TaskAssigned)
        .to(&["u1", "u2", "u3"])
        .via(&[Channel::InApp, Channel::Email])
        .with_content("Task", "Assigned");
    let batch = h.engine.send(&request).await.unwrap();

    assert_eq!(batch.total, 5);
    assert_eq!(batch.success_count + batch.failure_count, batch.total);
    assert_eq!(batch.results.len(), batch.total);
    assert_eq!(h.notifications.all().len(), 5);
}
