//! Handlers for the `/preferences` resource.

use axum::extract::{Path, State};
use axum::Json;
use mfgops_core::channels::Channel;
use mfgops_core::preference::{NotificationPreference, PreferenceUpsert, QuietHours};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppResult;
use crate::middleware::identity::Caller;
use crate::response::{CountResponse, DataResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub unsubscribed: bool,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// GET /api/v1/preferences
pub async fn list(
    caller: Caller,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<NotificationPreference>>>> {
    let rows = state
        .engine
        .preferences
        .list(&caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse { data: rows }))
}

/// PUT /api/v1/preferences
///
/// Create or update one `(type, channel)` row; settings are shallow-merged.
pub async fn upsert(
    caller: Caller,
    State(state): State<AppState>,
    Json(input): Json<PreferenceUpsert>,
) -> AppResult<Json<DataResponse<NotificationPreference>>> {
    let row = state
        .engine
        .preferences
        .upsert(&caller.user_id, &caller.tenant_id, &input)
        .await?;
    Ok(Json(DataResponse { data: row }))
}

/// PUT /api/v1/preferences/bulk
///
/// Nothing is written unless every row is valid.
pub async fn bulk_upsert(
    caller: Caller,
    State(state): State<AppState>,
    Json(inputs): Json<Vec<PreferenceUpsert>>,
) -> AppResult<Json<DataResponse<Vec<NotificationPreference>>>> {
    let rows = state
        .engine
        .preferences
        .bulk_upsert(&caller.user_id, &caller.tenant_id, &inputs)
        .await?;
    Ok(Json(DataResponse { data: rows }))
}

/// POST /api/v1/preferences/defaults
pub async fn set_defaults(
    caller: Caller,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CountResponse>>> {
    let count = state
        .engine
        .preferences
        .set_defaults(&caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse {
        data: CountResponse { count },
    }))
}

/// POST /api/v1/preferences/enable-all
pub async fn enable_all(
    caller: Caller,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CountResponse>>> {
    let count = state
        .engine
        .preferences
        .enable_all(&caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse {
        data: CountResponse { count },
    }))
}

/// POST /api/v1/preferences/disable-all
pub async fn disable_all(
    caller: Caller,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CountResponse>>> {
    let count = state
        .engine
        .preferences
        .disable_all(&caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse {
        data: CountResponse { count },
    }))
}

// ---------------------------------------------------------------------------
// Per-channel
// ---------------------------------------------------------------------------

/// PATCH /api/v1/preferences/channels/{channel}
///
/// Merge the body into the settings of every row for the channel.
pub async fn update_channel_settings(
    caller: Caller,
    State(state): State<AppState>,
    Path(channel): Path<Channel>,
    Json(patch): Json<Map<String, Value>>,
) -> AppResult<Json<DataResponse<CountResponse>>> {
    let count = state
        .engine
        .preferences
        .update_channel_settings(&caller.user_id, &caller.tenant_id, channel, &patch)
        .await?;
    Ok(Json(DataResponse {
        data: CountResponse { count },
    }))
}

/// GET /api/v1/preferences/channels/{channel}/quiet-hours
///
/// `data` is `null` when the channel has no quiet-hours window.
pub async fn quiet_hours(
    caller: Caller,
    State(state): State<AppState>,
    Path(channel): Path<Channel>,
) -> AppResult<Json<DataResponse<Option<QuietHours>>>> {
    let window = state
        .engine
        .preferences
        .quiet_hours(&caller.user_id, &caller.tenant_id, channel)
        .await?;
    Ok(Json(DataResponse { data: window }))
}

// ---------------------------------------------------------------------------
// Unsubscribe
// ---------------------------------------------------------------------------

/// POST /api/v1/preferences/channels/{channel}/unsubscribe-token
pub async fn issue_unsubscribe_token(
    caller: Caller,
    State(state): State<AppState>,
    Path(channel): Path<Channel>,
) -> AppResult<Json<DataResponse<TokenResponse>>> {
    let token = state
        .engine
        .preferences
        .issue_unsubscribe_token(&caller.user_id, channel)
        .await?;
    Ok(Json(DataResponse {
        data: TokenResponse { token },
    }))
}

/// POST /api/v1/preferences/unsubscribe
///
/// Token-only: unsubscribe links are opened without caller headers. Any bad
/// token yields `unsubscribed: false`, never an error.
pub async fn redeem_unsubscribe_token(
    State(state): State<AppState>,
    Json(body): Json<UnsubscribeRequest>,
) -> Json<DataResponse<UnsubscribeResponse>> {
    let unsubscribed = state.engine.preferences.redeem_unsubscribe_token(&body.token).await;
    Json(DataResponse {
        data: UnsubscribeResponse { unsubscribed },
    })
}
