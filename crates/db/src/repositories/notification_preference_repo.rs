//! Repository for the `notification_preferences` table.

use mfgops_core::channels::Channel;
use mfgops_core::notification::NotificationType;
use mfgops_core::preference::PreferenceUpsert;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::models::preference::PreferenceRow;

/// Column list for `notification_preferences` queries.
const COLUMNS: &str = "id, user_id, tenant_id, type, channel, enabled, settings, \
    unsubscribe_token, created_at, updated_at";

/// Provides CRUD operations for notification preferences.
pub struct NotificationPreferenceRepo;

impl NotificationPreferenceRepo {
    /// Get the preference for one `(user, tenant, type, channel)` scope.
    pub async fn find(
        pool: &PgPool,
        user_id: &str,
        tenant_id: &str,
        notification_type: NotificationType,
        channel: Channel,
    ) -> Result<Option<PreferenceRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_preferences \
             WHERE user_id = $1 AND tenant_id = $2 AND type = $3 AND channel = $4"
        );
        sqlx::query_as::<_, PreferenceRow>(&query)
            .bind(user_id)
            .bind(tenant_id)
            .bind(notification_type.as_str())
            .bind(channel.as_str())
            .fetch_optional(pool)
            .await
    }

    /// List all preferences of a user in a tenant.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Vec<PreferenceRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_preferences \
             WHERE user_id = $1 AND tenant_id = $2 \
             ORDER BY type, channel"
        );
        sqlx::query_as::<_, PreferenceRow>(&query)
            .bind(user_id)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    /// Insert or update a preference.
    ///
    /// On conflict `enabled` is overwritten and `settings` is shallow-merged
    /// with JSONB `||`, so keys absent from the patch are preserved.
    pub async fn upsert(
        pool: &PgPool,
        user_id: &str,
        tenant_id: &str,
        input: &PreferenceUpsert,
    ) -> Result<PreferenceRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_preferences \
                (user_id, tenant_id, type, channel, enabled, settings) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT uq_notification_preferences_scope DO UPDATE SET \
                enabled = EXCLUDED.enabled, \
                settings = notification_preferences.settings || EXCLUDED.settings, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PreferenceRow>(&query)
            .bind(user_id)
            .bind(tenant_id)
            .bind(input.notification_type.as_str())
            .bind(input.channel.as_str())
            .bind(input.enabled)
            .bind(Value::Object(input.settings.clone()))
            .fetch_one(pool)
            .await
    }

    /// Insert a preference only if its scope has no row yet.
    ///
    /// Returns `true` if a row was inserted.
    pub async fn insert_if_absent(
        pool: &PgPool,
        user_id: &str,
        tenant_id: &str,
        input: &PreferenceUpsert,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO notification_preferences \
                (user_id, tenant_id, type, channel, enabled, settings) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT uq_notification_preferences_scope DO NOTHING",
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(input.notification_type.as_str())
        .bind(input.channel.as_str())
        .bind(input.enabled)
        .bind(Value::Object(input.settings.clone()))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set `enabled` on every existing preference of a user in a tenant.
    pub async fn set_enabled_all(
        pool: &PgPool,
        user_id: &str,
        tenant_id: &str,
        enabled: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_preferences SET enabled = $3, updated_at = NOW() \
             WHERE user_id = $1 AND tenant_id = $2",
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(enabled)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Shallow-merge `patch` into the settings of every row for one channel.
    pub async fn merge_channel_settings(
        pool: &PgPool,
        user_id: &str,
        tenant_id: &str,
        channel: Channel,
        patch: &Map<String, Value>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_preferences \
             SET settings = settings || $4, updated_at = NOW() \
             WHERE user_id = $1 AND tenant_id = $2 AND channel = $3",
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(channel.as_str())
        .bind(Value::Object(patch.clone()))
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Remember `token` on every row of a user's channel, across tenants.
    pub async fn set_unsubscribe_token(
        pool: &PgPool,
        user_id: &str,
        channel: Channel,
        token: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_preferences SET unsubscribe_token = $3, updated_at = NOW() \
             WHERE user_id = $1 AND channel = $2",
        )
        .bind(user_id)
        .bind(channel.as_str())
        .bind(token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Disable the rows of one channel whose stored token matches.
    pub async fn redeem_unsubscribe_token(
        pool: &PgPool,
        user_id: &str,
        channel: Channel,
        token: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_preferences SET enabled = false, updated_at = NOW() \
             WHERE user_id = $1 AND channel = $2 AND unsubscribe_token = $3",
        )
        .bind(user_id)
        .bind(channel.as_str())
        .bind(token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
