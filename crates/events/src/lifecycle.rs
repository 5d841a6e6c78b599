//! User-driven status changes on existing notifications.
//!
//! Every operation is owner-scoped: a record that does not exist, belongs to
//! another user or lives in another tenant is reported as not found.

use std::sync::Arc;

use chrono::Utc;
use mfgops_core::error::CoreError;
use mfgops_core::notification::{Notification, NotificationStatus, StatusChange};
use mfgops_core::query::NotificationFilter;
use mfgops_core::types::DbId;

use crate::error::NotifyError;
use crate::store::NotificationStore;

pub struct LifecycleService {
    store: Arc<dyn NotificationStore>,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Fetch a record owned by `user_id` in `tenant_id`.
    pub async fn get(&self, id: DbId, user_id: &str, tenant_id: &str) -> Result<Notification, NotifyError> {
        match self.store.find(id).await? {
            Some(n) if n.user_id == user_id && n.tenant_id == tenant_id => Ok(n),
            _ => Err(CoreError::not_found("Notification", id).into()),
        }
    }

    pub async fn list(
        &self,
        user_id: &str,
        tenant_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, NotifyError> {
        Ok(self.store.list_for_user(user_id, tenant_id, filter).await?)
    }

    pub async fn unread_count(&self, user_id: &str, tenant_id: &str) -> Result<i64, NotifyError> {
        Ok(self.store.unread_count(user_id, tenant_id).await?)
    }

    /// Mark as READ. Repeating the call leaves `read_at` untouched.
    pub async fn mark_read(&self, id: DbId, user_id: &str, tenant_id: &str) -> Result<Notification, NotifyError> {
        let current = self.get(id, user_id, tenant_id).await?;
        if matches!(current.status, NotificationStatus::Read | NotificationStatus::Acknowledged) {
            return Ok(current);
        }
        let change = StatusChange::to(NotificationStatus::Read).with_read_at(Utc::now());
        self.apply(current, change).await
    }

    /// Mark as ACKNOWLEDGED, whether or not the record was read first.
    pub async fn acknowledge(&self, id: DbId, user_id: &str, tenant_id: &str) -> Result<Notification, NotifyError> {
        let current = self.get(id, user_id, tenant_id).await?;
        if current.status == NotificationStatus::Acknowledged {
            return Ok(current);
        }
        let change = StatusChange::to(NotificationStatus::Acknowledged).with_acknowledged_at(Utc::now());
        self.apply(current, change).await
    }

    /// Withdraw a record that has not reached the recipient yet.
    pub async fn cancel(&self, id: DbId, user_id: &str, tenant_id: &str) -> Result<Notification, NotifyError> {
        let current = self.get(id, user_id, tenant_id).await?;
        if current.status == NotificationStatus::Cancelled {
            return Ok(current);
        }
        self.apply(current, StatusChange::to(NotificationStatus::Cancelled)).await
    }

    /// DELIVERED in-app records of the user → READ. Returns how many moved.
    pub async fn mark_all_read(&self, user_id: &str, tenant_id: &str) -> Result<u64, NotifyError> {
        let updated = self.store.mark_all_read(user_id, tenant_id, Utc::now()).await?;
        tracing::debug!(user_id, tenant_id, updated, "Marked all notifications read");
        Ok(updated)
    }

    pub async fn delete(&self, id: DbId, user_id: &str, tenant_id: &str) -> Result<(), NotifyError> {
        self.get(id, user_id, tenant_id).await?;
        if !self.store.delete_owned(id, user_id).await? {
            return Err(CoreError::not_found("Notification", id).into());
        }
        Ok(())
    }

    async fn apply(&self, current: Notification, change: StatusChange) -> Result<Notification, NotifyError> {
        current.status.validate_transition(change.status)?;
        if let Some(updated) = self.store.transition(current.id, &change).await? {
            return Ok(updated);
        }
        // Lost a race: report against the status that won.
        let latest = self
            .store
            .find(current.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Notification", current.id))?;
        if latest.status == change.status {
            return Ok(latest);
        }
        Err(CoreError::Conflict(format!(
            "Invalid notification transition: {} -> {}",
            latest.status, change.status
        ))
        .into())
    }
}
