//! Persistence traits used by the engine.
//!
//! Each trait has a Postgres implementation ([`postgres`]) delegating to the
//! `mfgops_db` repositories and an in-memory implementation ([`memory`]) with
//! the same atomic-transition semantics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mfgops_core::channels::Channel;
use mfgops_core::notification::{NewNotification, Notification, NotificationType, StatusChange};
use mfgops_core::preference::{NotificationPreference, PreferenceUpsert};
use mfgops_core::query::{NotificationFilter, NotificationStats};
use mfgops_core::templates::{NewTemplate, NotificationTemplate, TemplateFilter, TemplateUpdate};
use mfgops_core::types::{DbId, TenantId, UserId};
use serde_json::{Map, Value};

use crate::error::StoreError;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryNotificationStore, MemoryPreferenceStore, MemoryTemplateStore, StaticDirectory};
pub use postgres::{PgDirectory, PgNotificationStore, PgPreferenceStore, PgTemplateStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// Notification records.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, new: &NewNotification) -> StoreResult<Notification>;

    async fn find(&self, id: DbId) -> StoreResult<Option<Notification>>;

    /// Apply `change` atomically if the record's current status is one of
    /// `change.expected_sources()`. `None` when no record matched.
    async fn transition(&self, id: DbId, change: &StatusChange) -> StoreResult<Option<Notification>>;

    async fn list_for_user(
        &self,
        user_id: &str,
        tenant_id: &str,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>>;

    async fn unread_count(&self, user_id: &str, tenant_id: &str) -> StoreResult<i64>;

    /// DELIVERED in-app records of the user → READ.
    async fn mark_all_read(&self, user_id: &str, tenant_id: &str, at: DateTime<Utc>) -> StoreResult<u64>;

    async fn delete_owned(&self, id: DbId, user_id: &str) -> StoreResult<bool>;

    /// FAILED records whose retry count is below `max_retry`.
    /// FAILED records under the retry cap that have not expired by `now`.
    async fn list_retryable(
        &self,
        tenant_id: &str,
        max_retry: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Notification>>;

    async fn count_exhausted(&self, tenant_id: &str, max_retry: i32) -> StoreResult<i64>;

    /// PENDING/QUEUED records past `expires_at` → EXPIRED.
    async fn expire_due(&self, tenant_id: &str, now: DateTime<Utc>) -> StoreResult<u64>;

    async fn list_due_queued(&self, tenant_id: &str, now: DateTime<Utc>) -> StoreResult<Vec<Notification>>;

    /// Hard-delete READ/ACKNOWLEDGED in-app records created before `cutoff`.
    async fn delete_read_before(&self, tenant_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    async fn stats(&self, tenant_id: &str, user_id: Option<&str>) -> StoreResult<NotificationStats>;

    /// Tenants with at least one record.
    async fn tenants(&self) -> StoreResult<Vec<TenantId>>;
}

/// Per-(user, tenant, type, channel) preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn find(
        &self,
        user_id: &str,
        tenant_id: &str,
        notification_type: NotificationType,
        channel: Channel,
    ) -> StoreResult<Option<NotificationPreference>>;

    async fn list_for_user(&self, user_id: &str, tenant_id: &str) -> StoreResult<Vec<NotificationPreference>>;

    /// Create, or overwrite `enabled` and shallow-merge `settings`.
    async fn upsert(
        &self,
        user_id: &str,
        tenant_id: &str,
        input: &PreferenceUpsert,
    ) -> StoreResult<NotificationPreference>;

    async fn insert_if_absent(&self, user_id: &str, tenant_id: &str, input: &PreferenceUpsert) -> StoreResult<bool>;

    async fn set_enabled_all(&self, user_id: &str, tenant_id: &str, enabled: bool) -> StoreResult<u64>;

    async fn merge_channel_settings(
        &self,
        user_id: &str,
        tenant_id: &str,
        channel: Channel,
        patch: &Map<String, Value>,
    ) -> StoreResult<u64>;

    async fn set_unsubscribe_token(&self, user_id: &str, channel: Channel, token: &str) -> StoreResult<u64>;

    async fn redeem_unsubscribe_token(&self, user_id: &str, channel: Channel, token: &str) -> StoreResult<u64>;
}

/// Tenant-scoped templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] if the tenant already uses the code.
    async fn create(&self, tenant_id: &str, id: &str, input: &NewTemplate) -> StoreResult<NotificationTemplate>;

    async fn insert_if_absent(&self, tenant_id: &str, id: &str, input: &NewTemplate) -> StoreResult<bool>;

    async fn find_by_id(&self, tenant_id: &str, id: &str) -> StoreResult<Option<NotificationTemplate>>;

    async fn find_by_code(&self, tenant_id: &str, code: &str) -> StoreResult<Option<NotificationTemplate>>;

    async fn list_active(&self, tenant_id: &str, filter: &TemplateFilter) -> StoreResult<Vec<NotificationTemplate>>;

    async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        input: &TemplateUpdate,
    ) -> StoreResult<Option<NotificationTemplate>>;

    async fn delete(&self, tenant_id: &str, id: &str) -> StoreResult<bool>;
}

/// The tenant/user/role directory owned by another service.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn users_with_role(&self, tenant_id: &str, role: &str) -> StoreResult<Vec<UserId>>;

    async fn email_address_of(&self, user_id: &str) -> StoreResult<Option<String>>;
}
