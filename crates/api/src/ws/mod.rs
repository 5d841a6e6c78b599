//! WebSocket infrastructure for real-time push.
//!
//! Provides connection management, heartbeat pings, the bridge that forwards
//! real-time bus events to the addressed user's connections, and the HTTP
//! upgrade handler used by Axum routes.

mod bridge;
mod handler;
mod heartbeat;
pub mod manager;

pub use bridge::{forward_event, start_bus_bridge};
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
