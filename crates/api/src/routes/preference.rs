//! Route definitions for the `/preferences` resource.

use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::handlers::preference;
use crate::state::AppState;

/// Routes mounted at `/preferences`.
///
/// ```text
/// GET    /                                     -> list
/// PUT    /                                     -> upsert
/// PUT    /bulk                                 -> bulk_upsert
/// POST   /defaults                             -> set_defaults
/// POST   /enable-all                           -> enable_all
/// POST   /disable-all                          -> disable_all
/// PATCH  /channels/{channel}                   -> update_channel_settings
/// GET    /channels/{channel}/quiet-hours       -> quiet_hours
/// POST   /channels/{channel}/unsubscribe-token -> issue_unsubscribe_token
/// POST   /unsubscribe                          -> redeem_unsubscribe_token
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(preference::list).put(preference::upsert))
        .route("/bulk", put(preference::bulk_upsert))
        .route("/defaults", post(preference::set_defaults))
        .route("/enable-all", post(preference::enable_all))
        .route("/disable-all", post(preference::disable_all))
        .route("/channels/{channel}", patch(preference::update_channel_settings))
        .route("/channels/{channel}/quiet-hours", get(preference::quiet_hours))
        .route(
            "/channels/{channel}/unsubscribe-token",
            post(preference::issue_unsubscribe_token),
        )
        .route("/unsubscribe", post(preference::redeem_unsubscribe_token))
}
