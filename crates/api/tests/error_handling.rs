//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly; no router is involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use mfgops_api::error::AppError;
use mfgops_core::error::CoreError;
use mfgops_events::{NotifyError, StoreError, SweepKind};

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn not_found_maps_to_404() {
    let (status, json) = error_to_response(CoreError::not_found("Notification", 42).into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Notification with id 42 not found");
}

#[tokio::test]
async fn validation_maps_to_400() {
    let err = AppError::from(NotifyError::validation("tenantId is required"));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "tenantId is required");
}

#[tokio::test]
async fn conflict_maps_to_409() {
    let (status, json) = error_to_response(CoreError::Conflict("already sent".into()).into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn sweep_in_progress_maps_to_409() {
    let err = AppError::from(NotifyError::SweepInProgress {
        kind: SweepKind::Expire,
        tenant_id: "t1".into(),
    });
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "SWEEP_IN_PROGRESS");
    assert_eq!(json["error"], "expire sweep already running for tenant t1");
}

#[tokio::test]
async fn unique_constraint_maps_to_409() {
    let err = AppError::from(StoreError::Duplicate("uq_notification_preferences_scope".into()));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"],
        "Duplicate value violates unique constraint: uq_notification_preferences_scope"
    );
}

#[tokio::test]
async fn primary_key_clash_is_internal() {
    let err = AppError::from(StoreError::Duplicate("notifications_pkey".into()));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn unavailable_store_maps_to_503() {
    let err = AppError::from(StoreError::Unavailable("pool exhausted".into()));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    let (status, json) = error_to_response(AppError::InternalError("secret detail".into())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[test]
fn notify_errors_keep_their_layer() {
    use assert_matches::assert_matches;

    assert_matches!(
        AppError::from(NotifyError::from(CoreError::Forbidden("x".into()))),
        AppError::Core(CoreError::Forbidden(_))
    );
    assert_matches!(
        AppError::from(NotifyError::from(StoreError::Unavailable("x".into()))),
        AppError::Store(StoreError::Unavailable(_))
    );
}
