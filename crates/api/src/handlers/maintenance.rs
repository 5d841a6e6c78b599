//! Handler for on-demand maintenance sweeps.
//!
//! Sweeps run for the caller's tenant. A sweep of the same kind already in
//! flight for that tenant answers 409.

use axum::extract::{Path, Query, State};
use axum::Json;
use mfgops_events::SweepKind;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::identity::Caller;
use crate::query::CleanupParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/notifications/maintenance/{kind}
///
/// `kind` is one of `retry`, `expire`, `dispatch-due`, `cleanup`.
pub async fn run_sweep(
    caller: Caller,
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<CleanupParams>,
) -> AppResult<Json<DataResponse<Value>>> {
    let kind: SweepKind = kind.parse().map_err(|e| AppError::BadRequest(format!("{e}")))?;
    let maintenance = &state.engine.maintenance;
    let tenant_id = caller.tenant_id.as_str();

    let data = match kind {
        SweepKind::Retry => {
            let report = maintenance.retry_failed(tenant_id).await?;
            json!(report)
        }
        SweepKind::Expire => {
            let expired = maintenance.cleanup_expired(tenant_id).await?;
            json!({ "expired": expired })
        }
        SweepKind::DispatchDue => {
            let report = maintenance.dispatch_due(tenant_id).await?;
            json!(report)
        }
        SweepKind::Cleanup => {
            let days = params.days_to_keep.unwrap_or(state.engine.config.retention_days);
            let deleted = maintenance.clear_old(tenant_id, days).await?;
            json!({ "deleted": deleted, "daysToKeep": days })
        }
    };

    tracing::info!(tenant_id, sweep = %kind, requested_by = %caller.user_id, "Manual sweep finished");
    Ok(Json(DataResponse { data }))
}
