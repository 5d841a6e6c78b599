//! Query and body types shared by handler modules.

use serde::Deserialize;

/// `?tenantWide=` on `GET /notifications/stats`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    /// Aggregate over the whole tenant instead of the caller only.
    #[serde(default)]
    pub tenant_wide: bool,
}

/// `?daysToKeep=` on the cleanup sweep. Falls back to the configured
/// retention period.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupParams {
    pub days_to_keep: Option<u32>,
}
