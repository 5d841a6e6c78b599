//! Repository for the `notification_templates` table.

use mfgops_core::channels::Channel;
use mfgops_core::notification::NotificationType;
use mfgops_core::templates::{NewTemplate, TemplateUpdate};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::template::TemplateRow;

/// Column list for `notification_templates` queries.
const COLUMNS: &str = "id, tenant_id, code, name, type, channel, subject, body, variables, \
    is_active, styling, metadata, created_at, updated_at";

/// Provides CRUD operations for notification templates.
pub struct NotificationTemplateRepo;

impl NotificationTemplateRepo {
    /// Insert a template under `id`.
    ///
    /// A duplicate `(tenant_id, code)` fails with the
    /// `uq_notification_templates_tenant_code` constraint.
    pub async fn create(
        pool: &PgPool,
        tenant_id: &str,
        id: &str,
        input: &NewTemplate,
    ) -> Result<TemplateRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_templates \
                (id, tenant_id, code, name, type, channel, subject, body, variables, \
                 is_active, styling, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TemplateRow>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(&input.code)
            .bind(&input.name)
            .bind(input.notification_type.as_str())
            .bind(input.channel.as_str())
            .bind(&input.subject)
            .bind(&input.body)
            .bind(Json(&input.variables))
            .bind(input.is_active)
            .bind(&input.styling)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    /// Insert unless the tenant already has a template with this code.
    ///
    /// Returns `true` if a row was inserted.
    pub async fn insert_if_absent(
        pool: &PgPool,
        tenant_id: &str,
        id: &str,
        input: &NewTemplate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO notification_templates \
                (id, tenant_id, code, name, type, channel, subject, body, variables, \
                 is_active, styling, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&input.code)
        .bind(&input.name)
        .bind(input.notification_type.as_str())
        .bind(input.channel.as_str())
        .bind(&input.subject)
        .bind(&input.body)
        .bind(Json(&input.variables))
        .bind(input.is_active)
        .bind(&input.styling)
        .bind(&input.metadata)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: &str,
        id: &str,
    ) -> Result<Option<TemplateRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_templates WHERE tenant_id = $1 AND id = $2"
        );
        sqlx::query_as::<_, TemplateRow>(&query)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_code(
        pool: &PgPool,
        tenant_id: &str,
        code: &str,
    ) -> Result<Option<TemplateRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_templates WHERE tenant_id = $1 AND code = $2"
        );
        sqlx::query_as::<_, TemplateRow>(&query)
            .bind(tenant_id)
            .bind(code)
            .fetch_optional(pool)
            .await
    }

    /// List active templates, optionally filtered by type and channel.
    pub async fn list_active(
        pool: &PgPool,
        tenant_id: &str,
        notification_type: Option<NotificationType>,
        channel: Option<Channel>,
    ) -> Result<Vec<TemplateRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_templates \
             WHERE tenant_id = $1 AND is_active \
               AND ($2::text IS NULL OR type = $2) \
               AND ($3::text IS NULL OR channel = $3) \
             ORDER BY code"
        );
        sqlx::query_as::<_, TemplateRow>(&query)
            .bind(tenant_id)
            .bind(notification_type.map(|t| t.as_str()))
            .bind(channel.map(|c| c.as_str()))
            .fetch_all(pool)
            .await
    }

    /// Update a template. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        tenant_id: &str,
        id: &str,
        input: &TemplateUpdate,
    ) -> Result<Option<TemplateRow>, sqlx::Error> {
        let query = format!(
            "UPDATE notification_templates SET \
                name = COALESCE($3, name), \
                subject = COALESCE($4, subject), \
                body = COALESCE($5, body), \
                variables = COALESCE($6, variables), \
                is_active = COALESCE($7, is_active), \
                styling = COALESCE($8, styling), \
                metadata = COALESCE($9, metadata), \
                updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TemplateRow>(&query)
            .bind(tenant_id)
            .bind(id)
            .bind(&input.name)
            .bind(&input.subject)
            .bind(&input.body)
            .bind(input.variables.as_ref().map(Json))
            .bind(input.is_active)
            .bind(&input.styling)
            .bind(&input.metadata)
            .fetch_optional(pool)
            .await
    }

    /// Delete a template. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, tenant_id: &str, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notification_templates WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
