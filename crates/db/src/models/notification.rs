//! Row model for the `notifications` table.

use mfgops_core::error::CoreError;
use mfgops_core::notification::{Notification, NotificationAction, NotificationMetadata};
use mfgops_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: DbId,
    pub tenant_id: String,
    pub user_id: String,
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub channel: String,
    pub priority: String,
    pub status: String,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub metadata: Option<Json<NotificationMetadata>>,
    pub template_id: Option<String>,
    pub group_id: Option<String>,
    pub scheduled_for: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
    pub read_at: Option<Timestamp>,
    pub acknowledged_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub actions: Option<Json<Vec<NotificationAction>>>,
    pub created_at: Timestamp,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = CoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            notification_type: row.notification_type.parse()?,
            channel: row.channel.parse()?,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            title: row.title,
            message: row.message,
            data: row.data,
            metadata: row.metadata.map(|Json(m)| m),
            template_id: row.template_id,
            group_id: row.group_id,
            scheduled_for: row.scheduled_for,
            sent_at: row.sent_at,
            read_at: row.read_at,
            acknowledged_at: row.acknowledged_at,
            expires_at: row.expires_at,
            retry_count: row.retry_count,
            last_error: row.last_error,
            actions: row.actions.map(|Json(a)| a),
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mfgops_core::channels::Channel;
    use mfgops_core::notification::NotificationStatus;

    fn row() -> NotificationRow {
        NotificationRow {
            id: 7,
            tenant_id: "t1".into(),
            user_id: "u1".into(),
            notification_type: "ORDER_DELAYED".into(),
            channel: "EMAIL".into(),
            priority: "HIGH".into(),
            status: "FAILED".into(),
            title: "Order delayed".into(),
            message: "ORD-001 is late".into(),
            data: None,
            metadata: None,
            template_id: None,
            group_id: None,
            scheduled_for: None,
            sent_at: None,
            read_at: None,
            acknowledged_at: None,
            expires_at: None,
            retry_count: 2,
            last_error: Some("smtp timeout".into()),
            actions: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn text_columns_parse_into_enums() {
        let n = Notification::try_from(row()).unwrap();
        assert_eq!(n.channel, Channel::Email);
        assert_eq!(n.status, NotificationStatus::Failed);
        assert!(n.is_retry_eligible());
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let mut r = row();
        r.status = "LOST".into();
        assert!(matches!(
            Notification::try_from(r),
            Err(CoreError::Validation(msg)) if msg.contains("LOST")
        ));
    }
}
