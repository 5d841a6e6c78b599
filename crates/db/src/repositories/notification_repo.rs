//! Repository for the `notifications` table.

use mfgops_core::channels::Channel;
use mfgops_core::notification::{NewNotification, NotificationStatus, StatusChange};
use mfgops_core::query::NotificationFilter;
use mfgops_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::models::notification::NotificationRow;

/// Column list for `notifications` queries.
const COLUMNS: &str = "id, tenant_id, user_id, type, channel, priority, status, title, message, \
    data, metadata, template_id, group_id, scheduled_for, sent_at, read_at, acknowledged_at, \
    expires_at, retry_count, last_error, actions, created_at";

/// Upper bound on records picked up by a single sweep.
const SWEEP_BATCH: i64 = 500;

/// One `GROUP BY` bucket of [`NotificationRepo::stats`].
#[derive(Debug, Clone, FromRow)]
pub struct StatsRow {
    pub status: String,
    pub channel: String,
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub exhausted: bool,
    pub count: i64,
}

fn status_texts(statuses: &[NotificationStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Provides persistence for notification records.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert a new record, returning the stored row.
    pub async fn create(pool: &PgPool, new: &NewNotification) -> Result<NotificationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications \
                (tenant_id, user_id, type, channel, priority, status, title, message, data, \
                 metadata, template_id, group_id, scheduled_for, expires_at, actions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(&new.tenant_id)
            .bind(&new.user_id)
            .bind(new.notification_type.as_str())
            .bind(new.channel.as_str())
            .bind(new.priority.as_str())
            .bind(new.status.as_str())
            .bind(&new.title)
            .bind(&new.message)
            .bind(&new.data)
            .bind(new.metadata.as_ref().map(Json))
            .bind(&new.template_id)
            .bind(&new.group_id)
            .bind(new.scheduled_for)
            .bind(new.expires_at)
            .bind(new.actions.as_ref().map(Json))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<NotificationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notifications WHERE id = $1");
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a status change if the record is currently in one of the
    /// change's expected source statuses.
    ///
    /// Returns `None` when no row matched (unknown id or wrong source status).
    /// Timestamps are only written when the column is still NULL.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        change: &StatusChange,
    ) -> Result<Option<NotificationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE notifications SET \
                status = $2, \
                sent_at = COALESCE(sent_at, $3), \
                read_at = COALESCE(read_at, $4), \
                acknowledged_at = COALESCE(acknowledged_at, $5), \
                last_error = COALESCE($6, last_error), \
                retry_count = retry_count + $7, \
                updated_at = NOW() \
             WHERE id = $1 AND status = ANY($8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(id)
            .bind(change.status.as_str())
            .bind(change.sent_at)
            .bind(change.read_at)
            .bind(change.acknowledged_at)
            .bind(&change.last_error)
            .bind(i32::from(change.increment_retry))
            .bind(status_texts(&change.expected_sources()))
            .fetch_optional(pool)
            .await
    }

    /// List a user's notifications in a tenant, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
        tenant_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE tenant_id = $1 AND user_id = $2 \
               AND ($3::text IS NULL OR status = $3) \
               AND ($4::text IS NULL OR channel = $4) \
               AND (NOT $5 OR status IN ('SENT', 'DELIVERED')) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $6 OFFSET $7"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(tenant_id)
            .bind(user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.channel.map(|c| c.as_str()))
            .bind(filter.unread_only)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(pool)
            .await
    }

    /// Number of SENT or DELIVERED records for a user in a tenant.
    pub async fn unread_count(pool: &PgPool, user_id: &str, tenant_id: &str) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE tenant_id = $1 AND user_id = $2 AND status IN ('SENT', 'DELIVERED')",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Move every DELIVERED in-app record of a user to READ.
    ///
    /// Returns the number of records updated.
    pub async fn mark_all_read(
        pool: &PgPool,
        user_id: &str,
        tenant_id: &str,
        at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET status = 'READ', read_at = COALESCE(read_at, $4), updated_at = NOW() \
             WHERE tenant_id = $1 AND user_id = $2 AND channel = $3 AND status = 'DELIVERED'",
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(Channel::InApp.as_str())
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete a record owned by `user_id`. Returns `false` if nothing matched.
    pub async fn delete_owned(pool: &PgPool, id: DbId, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// FAILED records with retries left that have not expired, oldest first.
    pub async fn list_retryable(
        pool: &PgPool,
        tenant_id: &str,
        max_retry: i32,
        now: Timestamp,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE tenant_id = $1 AND status = 'FAILED' AND retry_count < $2 \
               AND (expires_at IS NULL OR expires_at > $3) \
             ORDER BY created_at, id \
             LIMIT $4"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(tenant_id)
            .bind(max_retry)
            .bind(now)
            .bind(SWEEP_BATCH)
            .fetch_all(pool)
            .await
    }

    /// Number of FAILED records that have no retries left.
    pub async fn count_exhausted(pool: &PgPool, tenant_id: &str, max_retry: i32) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE tenant_id = $1 AND status = 'FAILED' AND retry_count >= $2",
        )
        .bind(tenant_id)
        .bind(max_retry)
        .fetch_one(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Mark PENDING/QUEUED records whose `expires_at` has passed as EXPIRED.
    pub async fn expire_due(pool: &PgPool, tenant_id: &str, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'EXPIRED', updated_at = NOW() \
             WHERE tenant_id = $1 AND status IN ('PENDING', 'QUEUED') \
               AND expires_at IS NOT NULL AND expires_at <= $2",
        )
        .bind(tenant_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// QUEUED records whose scheduled time has arrived and which have not expired.
    pub async fn list_due_queued(
        pool: &PgPool,
        tenant_id: &str,
        now: Timestamp,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE tenant_id = $1 AND status = 'QUEUED' \
               AND (scheduled_for IS NULL OR scheduled_for <= $2) \
               AND (expires_at IS NULL OR expires_at > $2) \
             ORDER BY scheduled_for NULLS FIRST, id \
             LIMIT $3"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(tenant_id)
            .bind(now)
            .bind(SWEEP_BATCH)
            .fetch_all(pool)
            .await
    }

    /// Hard-delete READ/ACKNOWLEDGED in-app records created before `cutoff`.
    pub async fn delete_read_before(
        pool: &PgPool,
        tenant_id: &str,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE tenant_id = $1 AND channel = $2 \
               AND status IN ('READ', 'ACKNOWLEDGED') AND created_at < $3",
        )
        .bind(tenant_id)
        .bind(Channel::InApp.as_str())
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Grouped counts for statistics, optionally restricted to one user.
    pub async fn stats(
        pool: &PgPool,
        tenant_id: &str,
        user_id: Option<&str>,
        max_retry: i32,
    ) -> Result<Vec<StatsRow>, sqlx::Error> {
        sqlx::query_as::<_, StatsRow>(
            "SELECT status, channel, type, \
                    (status = 'FAILED' AND retry_count >= $3) AS exhausted, \
                    COUNT(*) AS count \
             FROM notifications \
             WHERE tenant_id = $1 AND ($2::text IS NULL OR user_id = $2) \
             GROUP BY status, channel, type, exhausted",
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(max_retry)
        .fetch_all(pool)
        .await
    }

    /// Every tenant that has at least one record.
    pub async fn tenants(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT DISTINCT tenant_id FROM notifications ORDER BY tenant_id")
            .fetch_all(pool)
            .await
    }
}
