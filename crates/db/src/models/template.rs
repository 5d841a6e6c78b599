//! Row model for the `notification_templates` table.

use mfgops_core::error::CoreError;
use mfgops_core::template::TemplateVariable;
use mfgops_core::templates::NotificationTemplate;
use mfgops_core::types::Timestamp;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `notification_templates` table.
#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    pub id: String,
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub channel: String,
    pub subject: String,
    pub body: String,
    pub variables: Json<Vec<TemplateVariable>>,
    pub is_active: bool,
    pub styling: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<TemplateRow> for NotificationTemplate {
    type Error = CoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(NotificationTemplate {
            id: row.id,
            tenant_id: row.tenant_id,
            code: row.code,
            name: row.name,
            notification_type: row.notification_type.parse()?,
            channel: row.channel.parse()?,
            subject: row.subject,
            body: row.body,
            variables: row.variables.0,
            is_active: row.is_active,
            styling: row.styling,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
