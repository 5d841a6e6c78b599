//! Caller identity extractor.
//!
//! Authentication happens at the gateway, which forwards the resolved
//! tenant and user as trusted headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use mfgops_core::error::CoreError;
use mfgops_core::types::{TenantId, UserId};

use crate::error::AppError;
use crate::state::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// The tenant and user a request acts for.
///
/// ```ignore
/// async fn my_handler(caller: Caller) -> AppResult<Json<()>> {
///     tracing::info!(tenant_id = %caller.tenant_id, user_id = %caller.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Caller {
            tenant_id: header(parts, TENANT_HEADER)?,
            user_id: header(parts, USER_HEADER)?,
        })
    }
}

fn header(parts: &Parts, name: &str) -> Result<String, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized(format!("Missing {name} header"))))
}
