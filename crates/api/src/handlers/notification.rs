//! Handlers for the `/notifications` resource.
//!
//! Every endpoint acts for the [`Caller`]; records owned by another user or
//! tenant are reported as not found.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mfgops_core::error::CoreError;
use mfgops_core::notification::Notification;
use mfgops_core::query::{NotificationFilter, NotificationStats};
use mfgops_core::types::DbId;
use mfgops_events::{BatchResult, SendRequest};

use crate::error::AppResult;
use crate::middleware::identity::Caller;
use crate::query::StatsParams;
use crate::response::{CountResponse, DataResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// POST /api/v1/notifications/send
///
/// Fan one event out to its recipients. The request's tenant defaults to the
/// caller's; naming a different tenant is forbidden.
pub async fn send(
    caller: Caller,
    State(state): State<AppState>,
    Json(mut request): Json<SendRequest>,
) -> AppResult<Json<DataResponse<BatchResult>>> {
    if request.tenant_id.is_empty() {
        request.tenant_id = caller.tenant_id.clone();
    } else if request.tenant_id != caller.tenant_id {
        return Err(CoreError::Forbidden("Cannot send notifications for another tenant".into()).into());
    }

    let result = state.engine.send(&request).await?;
    tracing::info!(
        tenant_id = %caller.tenant_id,
        sent_by = %caller.user_id,
        total = result.total,
        failed = result.failure_count,
        "Notification batch sent"
    );
    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/notifications
pub async fn list(
    caller: Caller,
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let items = state
        .engine
        .lifecycle
        .list(&caller.user_id, &caller.tenant_id, &filter)
        .await?;
    Ok(Json(DataResponse { data: items }))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    caller: Caller,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<serde_json::Value>>> {
    let count = state
        .engine
        .lifecycle
        .unread_count(&caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse {
        data: serde_json::json!({ "count": count }),
    }))
}

/// GET /api/v1/notifications/stats
pub async fn stats(
    caller: Caller,
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> AppResult<Json<DataResponse<NotificationStats>>> {
    let user = (!params.tenant_wide).then_some(caller.user_id.as_str());
    let stats = state.engine.maintenance.stats(&caller.tenant_id, user).await?;
    Ok(Json(DataResponse { data: stats }))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    caller: Caller,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CountResponse>>> {
    let count = state
        .engine
        .lifecycle
        .mark_all_read(&caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse {
        data: CountResponse { count },
    }))
}

/// POST /api/v1/notifications/{id}/read
pub async fn mark_read(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let record = state
        .engine
        .lifecycle
        .mark_read(id, &caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse { data: record }))
}

/// POST /api/v1/notifications/{id}/acknowledge
pub async fn acknowledge(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let record = state
        .engine
        .lifecycle
        .acknowledge(id, &caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse { data: record }))
}

/// POST /api/v1/notifications/{id}/cancel
///
/// Only records that have not been handed to a channel yet can be cancelled.
pub async fn cancel(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let record = state
        .engine
        .lifecycle
        .cancel(id, &caller.user_id, &caller.tenant_id)
        .await?;
    Ok(Json(DataResponse { data: record }))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state
        .engine
        .lifecycle
        .delete(id, &caller.user_id, &caller.tenant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
