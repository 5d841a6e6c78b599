//! Forwarding of real-time bus events to WebSocket connections.

use std::sync::Arc;

use axum::extract::ws::Message;
use mfgops_events::{RealtimeBus, RealtimeEvent};
use tokio::sync::broadcast;

use crate::ws::manager::WsManager;

/// Subscribe to `bus` and push every user-addressed event to that user's
/// connections as a JSON text frame.
///
/// The task ends when the bus is dropped or the handle is aborted.
pub fn start_bus_bridge(bus: &RealtimeBus, ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    forward_event(&ws_manager, &event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "WebSocket bridge lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Real-time bus closed, WebSocket bridge shutting down");
                    break;
                }
            }
        }
    })
}

/// Push one event to the connections of the user it is addressed to.
/// Returns how many connections it was queued for.
pub async fn forward_event(ws_manager: &WsManager, event: &RealtimeEvent) -> usize {
    let Some(user_id) = event.user_id() else {
        return 0;
    };
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, event = %event.event, "Failed to serialize real-time event");
            return 0;
        }
    };
    let sent = ws_manager.send_to_user(user_id, Message::Text(text.into())).await;
    tracing::debug!(user_id, event = %event.event, connections = sent, "Real-time event forwarded");
    sent
}
