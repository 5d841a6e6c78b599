//! Postgres-backed stores delegating to the `mfgops_db` repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mfgops_core::channels::Channel;
use mfgops_core::notification::{NewNotification, Notification, NotificationType, StatusChange, MAX_RETRY_COUNT};
use mfgops_core::preference::{NotificationPreference, PreferenceUpsert};
use mfgops_core::query::{NotificationFilter, NotificationStats};
use mfgops_core::templates::{NewTemplate, NotificationTemplate, TemplateFilter, TemplateUpdate};
use mfgops_core::types::{DbId, TenantId, UserId};
use mfgops_db::repositories::{
    DirectoryRepo, NotificationPreferenceRepo, NotificationRepo, NotificationTemplateRepo, StatsRow,
};
use mfgops_db::DbPool;
use serde_json::{Map, Value};

use super::{Directory, NotificationStore, PreferenceStore, StoreResult, TemplateStore};

/// Convert a batch of rows, failing on the first invalid one.
fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = mfgops_core::error::CoreError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(Into::into))
        .collect()
}

fn convert_opt<R, T>(row: Option<R>) -> StoreResult<Option<T>>
where
    T: TryFrom<R, Error = mfgops_core::error::CoreError>,
{
    row.map(T::try_from).transpose().map_err(Into::into)
}

/// Fold `GROUP BY` buckets into [`NotificationStats`].
fn fold_stats(rows: Vec<StatsRow>) -> NotificationStats {
    let mut stats = NotificationStats::default();
    for row in rows {
        stats.total += row.count;
        *stats.by_status.entry(row.status.clone()).or_default() += row.count;
        *stats.by_channel.entry(row.channel.clone()).or_default() += row.count;
        *stats.by_type.entry(row.notification_type.clone()).or_default() += row.count;
        if row.status == "SENT" || row.status == "DELIVERED" {
            stats.unread += row.count;
        }
        if row.exhausted {
            stats.permanently_failed += row.count;
        }
    }
    stats
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, new: &NewNotification) -> StoreResult<Notification> {
        let row = NotificationRepo::create(&self.pool, new).await?;
        Ok(Notification::try_from(row)?)
    }

    async fn find(&self, id: DbId) -> StoreResult<Option<Notification>> {
        convert_opt(NotificationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn transition(&self, id: DbId, change: &StatusChange) -> StoreResult<Option<Notification>> {
        convert_opt(NotificationRepo::transition(&self.pool, id, change).await?)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        tenant_id: &str,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>> {
        convert_all(NotificationRepo::list_for_user(&self.pool, user_id, tenant_id, filter).await?)
    }

    async fn unread_count(&self, user_id: &str, tenant_id: &str) -> StoreResult<i64> {
        Ok(NotificationRepo::unread_count(&self.pool, user_id, tenant_id).await?)
    }

    async fn mark_all_read(&self, user_id: &str, tenant_id: &str, at: DateTime<Utc>) -> StoreResult<u64> {
        Ok(NotificationRepo::mark_all_read(&self.pool, user_id, tenant_id, at).await?)
    }

    async fn delete_owned(&self, id: DbId, user_id: &str) -> StoreResult<bool> {
        Ok(NotificationRepo::delete_owned(&self.pool, id, user_id).await?)
    }

    async fn list_retryable(
        &self,
        tenant_id: &str,
        max_retry: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Notification>> {
        convert_all(NotificationRepo::list_retryable(&self.pool, tenant_id, max_retry, now).await?)
    }

    async fn count_exhausted(&self, tenant_id: &str, max_retry: i32) -> StoreResult<i64> {
        Ok(NotificationRepo::count_exhausted(&self.pool, tenant_id, max_retry).await?)
    }

    async fn expire_due(&self, tenant_id: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(NotificationRepo::expire_due(&self.pool, tenant_id, now).await?)
    }

    async fn list_due_queued(&self, tenant_id: &str, now: DateTime<Utc>) -> StoreResult<Vec<Notification>> {
        convert_all(NotificationRepo::list_due_queued(&self.pool, tenant_id, now).await?)
    }

    async fn delete_read_before(&self, tenant_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        Ok(NotificationRepo::delete_read_before(&self.pool, tenant_id, cutoff).await?)
    }

    async fn stats(&self, tenant_id: &str, user_id: Option<&str>) -> StoreResult<NotificationStats> {
        let rows = NotificationRepo::stats(&self.pool, tenant_id, user_id, MAX_RETRY_COUNT).await?;
        Ok(fold_stats(rows))
    }

    async fn tenants(&self) -> StoreResult<Vec<TenantId>> {
        Ok(NotificationRepo::tenants(&self.pool).await?)
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgPreferenceStore {
    pool: DbPool,
}

impl PgPreferenceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn find(
        &self,
        user_id: &str,
        tenant_id: &str,
        notification_type: NotificationType,
        channel: Channel,
    ) -> StoreResult<Option<NotificationPreference>> {
        convert_opt(
            NotificationPreferenceRepo::find(&self.pool, user_id, tenant_id, notification_type, channel).await?,
        )
    }

    async fn list_for_user(&self, user_id: &str, tenant_id: &str) -> StoreResult<Vec<NotificationPreference>> {
        convert_all(NotificationPreferenceRepo::list_for_user(&self.pool, user_id, tenant_id).await?)
    }

    async fn upsert(
        &self,
        user_id: &str,
        tenant_id: &str,
        input: &PreferenceUpsert,
    ) -> StoreResult<NotificationPreference> {
        let row = NotificationPreferenceRepo::upsert(&self.pool, user_id, tenant_id, input).await?;
        Ok(NotificationPreference::try_from(row)?)
    }

    async fn insert_if_absent(&self, user_id: &str, tenant_id: &str, input: &PreferenceUpsert) -> StoreResult<bool> {
        Ok(NotificationPreferenceRepo::insert_if_absent(&self.pool, user_id, tenant_id, input).await?)
    }

    async fn set_enabled_all(&self, user_id: &str, tenant_id: &str, enabled: bool) -> StoreResult<u64> {
        Ok(NotificationPreferenceRepo::set_enabled_all(&self.pool, user_id, tenant_id, enabled).await?)
    }

    async fn merge_channel_settings(
        &self,
        user_id: &str,
        tenant_id: &str,
        channel: Channel,
        patch: &Map<String, Value>,
    ) -> StoreResult<u64> {
        Ok(
            NotificationPreferenceRepo::merge_channel_settings(&self.pool, user_id, tenant_id, channel, patch)
                .await?,
        )
    }

    async fn set_unsubscribe_token(&self, user_id: &str, channel: Channel, token: &str) -> StoreResult<u64> {
        Ok(NotificationPreferenceRepo::set_unsubscribe_token(&self.pool, user_id, channel, token).await?)
    }

    async fn redeem_unsubscribe_token(&self, user_id: &str, channel: Channel, token: &str) -> StoreResult<u64> {
        Ok(NotificationPreferenceRepo::redeem_unsubscribe_token(&self.pool, user_id, channel, token).await?)
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgTemplateStore {
    pool: DbPool,
}

impl PgTemplateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn create(&self, tenant_id: &str, id: &str, input: &NewTemplate) -> StoreResult<NotificationTemplate> {
        let row = NotificationTemplateRepo::create(&self.pool, tenant_id, id, input).await?;
        Ok(NotificationTemplate::try_from(row)?)
    }

    async fn insert_if_absent(&self, tenant_id: &str, id: &str, input: &NewTemplate) -> StoreResult<bool> {
        Ok(NotificationTemplateRepo::insert_if_absent(&self.pool, tenant_id, id, input).await?)
    }

    async fn find_by_id(&self, tenant_id: &str, id: &str) -> StoreResult<Option<NotificationTemplate>> {
        convert_opt(NotificationTemplateRepo::find_by_id(&self.pool, tenant_id, id).await?)
    }

    async fn find_by_code(&self, tenant_id: &str, code: &str) -> StoreResult<Option<NotificationTemplate>> {
        convert_opt(NotificationTemplateRepo::find_by_code(&self.pool, tenant_id, code).await?)
    }

    async fn list_active(&self, tenant_id: &str, filter: &TemplateFilter) -> StoreResult<Vec<NotificationTemplate>> {
        convert_all(
            NotificationTemplateRepo::list_active(&self.pool, tenant_id, filter.notification_type, filter.channel)
                .await?,
        )
    }

    async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        input: &TemplateUpdate,
    ) -> StoreResult<Option<NotificationTemplate>> {
        convert_opt(NotificationTemplateRepo::update(&self.pool, tenant_id, id, input).await?)
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> StoreResult<bool> {
        Ok(NotificationTemplateRepo::delete(&self.pool, tenant_id, id).await?)
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgDirectory {
    pool: DbPool,
}

impl PgDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn users_with_role(&self, tenant_id: &str, role: &str) -> StoreResult<Vec<UserId>> {
        Ok(DirectoryRepo::users_with_role(&self.pool, tenant_id, role).await?)
    }

    async fn email_address_of(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(DirectoryRepo::email_of(&self.pool, user_id).await?)
    }
}
