//! Handlers for the `/templates` resource.
//!
//! Templates are scoped to the caller's tenant.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mfgops_core::template::RenderedContent;
use mfgops_core::templates::{NewTemplate, NotificationTemplate, TemplateFilter, TemplateUpdate};
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
pub struct ValidateRequest {
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub data: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/templates
///
/// Active templates, optionally filtered by `?type=&channel=`.
pub async fn list(
    caller: Caller,
    State(state): State<AppState>,
    Query(filter): Query<TemplateFilter>,
) -> AppResult<Json<DataResponse<Vec<NotificationTemplate>>>> {
    let items = state.engine.templates.list(&caller.tenant_id, &filter).await?;
    Ok(Json(DataResponse { data: items }))
}

/// POST /api/v1/templates
pub async fn create(
    caller: Caller,
    State(state): State<AppState>,
    Json(input): Json<NewTemplate>,
) -> AppResult<impl IntoResponse> {
    let template = state.engine.templates.create(&caller.tenant_id, &input).await?;
    tracing::info!(tenant_id = %caller.tenant_id, template_id = %template.id, code = %template.code, "Template created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: template })))
}

/// GET /api/v1/templates/{id}
pub async fn get(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<NotificationTemplate>>> {
    let template = state.engine.templates.get(&caller.tenant_id, &id).await?;
    Ok(Json(DataResponse { data: template }))
}

/// GET /api/v1/templates/code/{code}
pub async fn get_by_code(
    caller: Caller,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<DataResponse<NotificationTemplate>>> {
    let template = state.engine.templates.get_by_code(&caller.tenant_id, &code).await?;
    Ok(Json(DataResponse { data: template }))
}

/// PUT /api/v1/templates/{id}
pub async fn update(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<TemplateUpdate>,
) -> AppResult<Json<DataResponse<NotificationTemplate>>> {
    let template = state.engine.templates.update(&caller.tenant_id, &id, &input).await?;
    Ok(Json(DataResponse { data: template }))
}

/// DELETE /api/v1/templates/{id}
pub async fn delete(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.engine.templates.delete(&caller.tenant_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tooling
// ---------------------------------------------------------------------------

/// POST /api/v1/templates/seed
///
/// Insert the built-in templates the tenant does not have yet.
pub async fn seed(caller: Caller, State(state): State<AppState>) -> AppResult<Json<DataResponse<CountResponse>>> {
    let count = state.engine.templates.seed_defaults(&caller.tenant_id).await?;
    Ok(Json(DataResponse {
        data: CountResponse { count },
    }))
}

/// POST /api/v1/templates/validate
///
/// Syntax check only; an invalid source is `valid: false`, not an error.
pub async fn validate(
    _caller: Caller,
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> Json<DataResponse<ValidateResponse>> {
    Json(DataResponse {
        data: ValidateResponse {
            valid: state.engine.templates.validate(&body.source),
        },
    })
}

/// POST /api/v1/templates/{id}/render
pub async fn render(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RenderRequest>,
) -> AppResult<Json<DataResponse<RenderedContent>>> {
    let rendered = state
        .engine
        .templates
        .render_by_id(&caller.tenant_id, &id, &body.data)
        .await?;
    Ok(Json(DataResponse { data: rendered }))
}
