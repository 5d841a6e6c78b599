//! Route definitions for the `/notifications` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{maintenance, notification};
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// GET    /                          -> list
/// POST   /send                      -> send
/// GET    /unread-count              -> unread_count
/// GET    /stats                     -> stats
/// POST   /read-all                  -> mark_all_read
/// POST   /maintenance/{kind}        -> run_sweep
/// DELETE /{id}                      -> delete
/// POST   /{id}/read                 -> mark_read
/// POST   /{id}/acknowledge          -> acknowledge
/// POST   /{id}/cancel               -> cancel
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(notification::list))
        .route("/send", post(notification::send))
        .route("/unread-count", get(notification::unread_count))
        .route("/stats", get(notification::stats))
        .route("/read-all", post(notification::mark_all_read))
        .route("/maintenance/{kind}", post(maintenance::run_sweep))
        .route("/{id}", delete(notification::delete))
        .route("/{id}/read", post(notification::mark_read))
        .route("/{id}/acknowledge", post(notification::acknowledge))
        .route("/{id}/cancel", post(notification::cancel))
}
