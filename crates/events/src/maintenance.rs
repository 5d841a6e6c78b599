//! Tenant-scoped maintenance sweeps.
//!
//! Each sweep kind runs at most once at a time per tenant; a second request
//! while one is in flight fails with [`NotifyError::SweepInProgress`].
//! Sweeps only touch records through the store's atomic transitions, so they
//! are safe alongside live dispatch.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use mfgops_core::error::CoreError;
use mfgops_core::notification::{NotificationStatus, StatusChange, MAX_RETRY_COUNT};
use mfgops_core::query::NotificationStats;
use mfgops_core::types::TenantId;
use parking_lot::Mutex;
use serde::Serialize;

use crate::delivery::DeliveryContext;
use crate::dispatch::Dispatcher;
use crate::error::NotifyError;
use crate::preferences::{Gate, PreferenceService};
use crate::store::NotificationStore;

// ---------------------------------------------------------------------------
// Sweep kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepKind {
    Retry,
    Expire,
    DispatchDue,
    Cleanup,
}

impl SweepKind {
    pub const ALL: &'static [SweepKind] = &[
        SweepKind::Retry,
        SweepKind::Expire,
        SweepKind::DispatchDue,
        SweepKind::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Retry => "retry",
            SweepKind::Expire => "expire",
            SweepKind::DispatchDue => "dispatch-due",
            SweepKind::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SweepKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SweepKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown sweep '{s}'. Valid values: retry, expire, dispatch-due, cleanup"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryReport {
    /// Records moved back to PENDING and re-sent.
    pub retried: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records whose preference was disabled or removed since they failed.
    pub cancelled: usize,
    /// Records left FAILED for a later sweep (quiet hours, lookup error).
    pub deferred: usize,
    /// FAILED records that have used up every retry.
    pub exhausted: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueReport {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Due records whose preference was disabled in the meantime.
    pub cancelled: usize,
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

type SweepKey = (TenantId, SweepKind);

struct SweepGuard<'a> {
    running: &'a Mutex<HashSet<SweepKey>>,
    key: SweepKey,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.running.lock().remove(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

pub struct Maintenance {
    store: Arc<dyn NotificationStore>,
    dispatcher: Arc<Dispatcher>,
    preferences: Arc<PreferenceService>,
    running: Mutex<HashSet<SweepKey>>,
}

impl Maintenance {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        dispatcher: Arc<Dispatcher>,
        preferences: Arc<PreferenceService>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            preferences,
            running: Mutex::new(HashSet::new()),
        }
    }

    fn begin(&self, tenant_id: &str, kind: SweepKind) -> Result<SweepGuard<'_>, NotifyError> {
        let key = (tenant_id.to_string(), kind);
        if !self.running.lock().insert(key.clone()) {
            return Err(NotifyError::SweepInProgress {
                kind,
                tenant_id: tenant_id.to_string(),
            });
        }
        Ok(SweepGuard {
            running: &self.running,
            key,
        })
    }

    /// Whether a sweep of `kind` is currently running for the tenant.
    pub fn is_running(&self, tenant_id: &str, kind: SweepKind) -> bool {
        self.running.lock().contains(&(tenant_id.to_string(), kind))
    }

    /// Re-send FAILED records that still have retries left.
    ///
    /// Each record's retry count goes up by exactly one, atomically with its
    /// move back to PENDING; records at the cap or past `expires_at` are never
    /// picked up. The preference is checked again first: an opted-out pair is
    /// cancelled and a pair inside quiet hours waits for a later sweep.
    pub async fn retry_failed(&self, tenant_id: &str) -> Result<RetryReport, NotifyError> {
        let _guard = self.begin(tenant_id, SweepKind::Retry)?;
        let now = Utc::now();
        let mut report = RetryReport::default();

        for record in self.store.list_retryable(tenant_id, MAX_RETRY_COUNT, now).await? {
            let gate = self
                .preferences
                .gate(
                    &record.user_id,
                    &record.tenant_id,
                    record.notification_type,
                    record.channel,
                    record.priority,
                    now,
                )
                .await;
            let contact_override = match gate {
                Ok(Gate::Send { contact_override }) => contact_override,
                Ok(Gate::Skip { reason }) => {
                    let change = StatusChange::to(NotificationStatus::Cancelled)
                        .with_error(format!("Skipped at retry time: {reason}"));
                    if self.store.transition(record.id, &change).await?.is_some() {
                        report.cancelled += 1;
                    }
                    continue;
                }
                Ok(Gate::Defer { .. }) => {
                    report.deferred += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(notification_id = record.id, error = %e, "Preference lookup failed, retry postponed");
                    report.deferred += 1;
                    continue;
                }
            };

            let change = StatusChange::to(NotificationStatus::Pending).with_retry_increment();
            let Some(pending) = self.store.transition(record.id, &change).await? else {
                continue;
            };
            report.retried += 1;
            if self.dispatcher.deliver(pending, &DeliveryContext { contact_override }).await.success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        report.exhausted = self.store.count_exhausted(tenant_id, MAX_RETRY_COUNT).await?;
        if report.exhausted > 0 {
            tracing::warn!(tenant_id, exhausted = report.exhausted, "Notifications permanently failed");
        }
        tracing::info!(
            tenant_id,
            retried = report.retried,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            deferred = report.deferred,
            "Retry sweep finished"
        );
        Ok(report)
    }

    /// PENDING/QUEUED records past `expires_at` → EXPIRED. Nothing is deleted.
    pub async fn cleanup_expired(&self, tenant_id: &str) -> Result<u64, NotifyError> {
        let _guard = self.begin(tenant_id, SweepKind::Expire)?;
        let expired = self.store.expire_due(tenant_id, Utc::now()).await?;
        if expired > 0 {
            tracing::info!(tenant_id, expired, "Expired notifications");
        }
        Ok(expired)
    }

    /// Hard-delete read in-app records older than `days_to_keep` days.
    pub async fn clear_old(&self, tenant_id: &str, days_to_keep: u32) -> Result<u64, NotifyError> {
        let _guard = self.begin(tenant_id, SweepKind::Cleanup)?;
        let cutoff = Utc::now() - Duration::days(i64::from(days_to_keep));
        let deleted = self.store.delete_read_before(tenant_id, cutoff).await?;
        tracing::info!(tenant_id, days_to_keep, deleted, "Old notifications cleared");
        Ok(deleted)
    }

    /// Deliver QUEUED records whose scheduled time has come.
    pub async fn dispatch_due(&self, tenant_id: &str) -> Result<DueReport, NotifyError> {
        let _guard = self.begin(tenant_id, SweepKind::DispatchDue)?;
        let now = Utc::now();
        let mut report = DueReport::default();

        for record in self.store.list_due_queued(tenant_id, now).await? {
            let gate = self
                .preferences
                .gate(
                    &record.user_id,
                    &record.tenant_id,
                    record.notification_type,
                    record.channel,
                    record.priority,
                    now,
                )
                .await;
            let contact_override = match gate {
                Ok(Gate::Skip { reason }) => {
                    let change = StatusChange::to(NotificationStatus::Cancelled)
                        .with_error(format!("Skipped at delivery time: {reason}"));
                    if self.store.transition(record.id, &change).await?.is_some() {
                        report.cancelled += 1;
                    }
                    continue;
                }
                // The record already waited for its window or explicit time.
                Ok(Gate::Send { contact_override } | Gate::Defer { contact_override, .. }) => contact_override,
                Err(e) => {
                    tracing::warn!(notification_id = record.id, error = %e, "Preference lookup failed, delivering anyway");
                    None
                }
            };

            let Some(pending) = self
                .store
                .transition(record.id, &StatusChange::to(NotificationStatus::Pending))
                .await?
            else {
                continue;
            };
            report.dispatched += 1;
            if self.dispatcher.deliver(pending, &DeliveryContext { contact_override }).await.success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.dispatched + report.cancelled > 0 {
            tracing::info!(
                tenant_id,
                dispatched = report.dispatched,
                cancelled = report.cancelled,
                failed = report.failed,
                "Due notifications dispatched"
            );
        }
        Ok(report)
    }

    pub async fn stats(&self, tenant_id: &str, user_id: Option<&str>) -> Result<NotificationStats, NotifyError> {
        Ok(self.store.stats(tenant_id, user_id).await?)
    }

    pub async fn tenants(&self) -> Result<Vec<TenantId>, NotifyError> {
        Ok(self.store.tenants().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_kind_parses_route_names() {
        for kind in SweepKind::ALL {
            assert_eq!(kind.as_str().parse::<SweepKind>().unwrap(), *kind);
        }
        assert!("vacuum".parse::<SweepKind>().is_err());
        assert_eq!(SweepKind::DispatchDue.to_string(), "dispatch-due");
    }
}
