//! Tests for `WsManager` and the bus-to-socket bridge.
//!
//! These exercise the manager directly, without HTTP upgrades.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use mfgops_api::ws::{forward_event, start_bus_bridge, WsManager};
use mfgops_events::bus::user_topic;
use mfgops_events::{RealtimeBus, RealtimeEvent};
use serde_json::json;

// ---------------------------------------------------------------------------
// Connection bookkeeping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count().await, 0);

    let _rx = manager.add("conn-1".into(), "t1".into(), "u1".into()).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("nonexistent").await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn get_by_user_lists_only_that_users_connections() {
    let manager = WsManager::new();
    let _a = manager.add("a".into(), "t1".into(), "u1".into()).await;
    let _b = manager.add("b".into(), "t1".into(), "u1".into()).await;
    let _c = manager.add("c".into(), "t1".into(), "u2".into()).await;

    let mut ids = manager.get_by_user("u1").await;
    ids.sort();
    assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();
    let mut rx = manager.add("conn-1".into(), "t1".into(), "u1".into()).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    let msg = rx.recv().await.expect("should receive Close");
    assert!(matches!(msg, Message::Close(None)), "Expected Close(None), got: {msg:?}");
    assert!(rx.recv().await.is_none(), "Channel should be closed after shutdown");
}

#[tokio::test]
async fn ping_all_reaches_every_connection() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".into(), "t1".into(), "u1".into()).await;
    let mut rx2 = manager.add("conn-2".into(), "t2".into(), "u7".into()).await;

    manager.ping_all().await;

    assert!(matches!(rx1.recv().await, Some(Message::Ping(_))));
    assert!(matches!(rx2.recv().await, Some(Message::Ping(_))));
}

#[tokio::test]
async fn send_to_user_skips_closed_channels() {
    let manager = WsManager::new();
    let closed = manager.add("conn-1".into(), "t1".into(), "u1".into()).await;
    let mut open = manager.add("conn-2".into(), "t1".into(), "u1".into()).await;
    drop(closed);

    let sent = manager.send_to_user("u1", Message::Text("hi".into())).await;

    assert_eq!(sent, 1);
    assert!(matches!(open.recv().await, Some(Message::Text(t)) if t == "hi"));
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forward_event_targets_the_addressed_user() {
    let manager = WsManager::new();
    let mut u1 = manager.add("conn-1".into(), "t1".into(), "u1".into()).await;
    let mut u2 = manager.add("conn-2".into(), "t1".into(), "u2".into()).await;

    let event = RealtimeEvent::new(user_topic("u1"), "notification.created", json!({ "id": 5 }));
    assert_eq!(forward_event(&manager, &event).await, 1);

    let Some(Message::Text(text)) = u1.recv().await else {
        panic!("u1 should receive a text frame");
    };
    let frame: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(frame["event"], "notification.created");
    assert_eq!(frame["topic"], "user:u1");
    assert_eq!(frame["payload"]["id"], 5);

    assert!(u2.try_recv().is_err());
}

#[tokio::test]
async fn events_without_a_user_are_dropped() {
    let manager = WsManager::new();
    let mut rx = manager.add("conn-1".into(), "t1".into(), "u1".into()).await;

    let event = RealtimeEvent::new("tenant:t1", "maintenance.finished", json!({}));
    assert_eq!(forward_event(&manager, &event).await, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn bridge_forwards_published_events() {
    let bus = RealtimeBus::default();
    let manager = Arc::new(WsManager::new());
    let mut rx = manager.add("conn-1".into(), "t1".into(), "u1".into()).await;
    let handle = start_bus_bridge(&bus, Arc::clone(&manager));

    bus.publish(RealtimeEvent::new(user_topic("u1"), "notification.push", json!({ "id": 9 })));

    let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("bridge forwards within a second");
    assert!(matches!(msg, Some(Message::Text(_))));
    handle.abort();
}
