pub mod health;
pub mod notification;
pub mod preference;
pub mod template;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Every route except `/preferences/unsubscribe` expects the `x-tenant-id`
/// and `x-user-id` caller headers.
///
/// ```text
/// /ws                                              WebSocket push
///
/// /notifications/send                              fan out one event (POST)
/// /notifications                                   list own records
/// /notifications/unread-count                      unread count
/// /notifications/stats                             aggregate counts
/// /notifications/read-all                          mark all read (POST)
/// /notifications/{id}                              delete
/// /notifications/{id}/read|acknowledge|cancel      lifecycle (POST)
/// /notifications/maintenance/{kind}                run a sweep (POST)
///
/// /preferences                                     list, upsert
/// /preferences/bulk                                bulk upsert (PUT)
/// /preferences/defaults|enable-all|disable-all     matrix helpers (POST)
/// /preferences/channels/{channel}                  merge settings (PATCH)
/// /preferences/channels/{channel}/quiet-hours      effective window
/// /preferences/channels/{channel}/unsubscribe-token issue token (POST)
/// /preferences/unsubscribe                         redeem token (POST)
///
/// /templates                                       list, create
/// /templates/seed                                  built-in templates (POST)
/// /templates/validate                              syntax check (POST)
/// /templates/code/{code}                           get by code
/// /templates/{id}                                  get, update, delete
/// /templates/{id}/render                           render (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/notifications", notification::router())
        .nest("/preferences", preference::router())
        .nest("/templates", template::router())
}
