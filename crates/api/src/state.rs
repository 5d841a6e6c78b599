use std::sync::Arc;

use mfgops_events::Engine;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; every field is an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Notification engine services.
    pub engine: Engine,
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Postgres pool, absent when running on in-memory stores.
    pub pool: Option<mfgops_db::DbPool>,
}
