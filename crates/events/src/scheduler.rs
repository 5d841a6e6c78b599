//! Background maintenance scheduler.
//!
//! [`MaintenanceScheduler`] runs two periodic loops until cancelled: a
//! frequent one that dispatches due records, retries failures and expires
//! stale records for every tenant with notifications, and a slow retention
//! loop that clears old read in-app records.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::NotifyError;
use crate::maintenance::Maintenance;

// ---------------------------------------------------------------------------
// MaintenanceScheduler
// ---------------------------------------------------------------------------

pub struct MaintenanceScheduler {
    maintenance: Arc<Maintenance>,
    sweep_interval: Duration,
    retention_interval: Duration,
    retention_days: u32,
}

impl MaintenanceScheduler {
    pub fn new(
        maintenance: Arc<Maintenance>,
        sweep_interval: Duration,
        retention_interval: Duration,
        retention_days: u32,
    ) -> Self {
        Self {
            maintenance,
            sweep_interval,
            retention_interval,
            retention_days,
        }
    }

    /// Run both loops. Returns once `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut retention = tokio::time::interval(self.retention_interval);
        retention.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Maintenance scheduler cancelled");
                    break;
                }
                _ = sweep.tick() => {
                    if let Err(e) = self.run_sweeps(&cancel).await {
                        tracing::error!(error = %e, "Failed to run maintenance sweeps");
                    }
                }
                _ = retention.tick() => {
                    if let Err(e) = self.run_retention(&cancel).await {
                        tracing::error!(error = %e, "Failed to run retention sweep");
                    }
                }
            }
        }
    }

    /// One pass of dispatch-due, retry and expire over every tenant.
    ///
    /// Stops between tenants once `cancel` fires.
    pub async fn run_sweeps(&self, cancel: &CancellationToken) -> Result<(), NotifyError> {
        for tenant_id in self.maintenance.tenants().await? {
            if cancel.is_cancelled() {
                tracing::debug!(tenant_id = %tenant_id, "Sweep pass interrupted by shutdown");
                break;
            }
            if let Err(e) = self.maintenance.dispatch_due(&tenant_id).await {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "Dispatch-due sweep failed");
            }
            if let Err(e) = self.maintenance.retry_failed(&tenant_id).await {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "Retry sweep failed");
            }
            if let Err(e) = self.maintenance.cleanup_expired(&tenant_id).await {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "Expire sweep failed");
            }
        }
        Ok(())
    }

    /// One pass of the retention sweep over every tenant.
    pub async fn run_retention(&self, cancel: &CancellationToken) -> Result<(), NotifyError> {
        for tenant_id in self.maintenance.tenants().await? {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.maintenance.clear_old(&tenant_id, self.retention_days).await {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "Retention sweep failed");
            }
        }
        Ok(())
    }
}
