//! Row model for the `notification_preferences` table.

use mfgops_core::error::CoreError;
use mfgops_core::preference::NotificationPreference;
use mfgops_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `notification_preferences` table.
#[derive(Debug, Clone, FromRow)]
pub struct PreferenceRow {
    pub id: DbId,
    pub user_id: String,
    pub tenant_id: String,
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub channel: String,
    pub enabled: bool,
    pub settings: serde_json::Value,
    pub unsubscribe_token: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<PreferenceRow> for NotificationPreference {
    type Error = CoreError;

    fn try_from(row: PreferenceRow) -> Result<Self, Self::Error> {
        let settings = match row.settings {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(CoreError::Validation(format!(
                    "Preference {} has non-object settings: {other}",
                    row.id
                )))
            }
        };
        Ok(NotificationPreference {
            id: row.id,
            user_id: row.user_id,
            tenant_id: row.tenant_id,
            notification_type: row.notification_type.parse()?,
            channel: row.channel.parse()?,
            enabled: row.enabled,
            settings,
            unsubscribe_token: row.unsubscribe_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(settings: serde_json::Value) -> PreferenceRow {
        PreferenceRow {
            id: 1,
            user_id: "u1".into(),
            tenant_id: "t1".into(),
            notification_type: "TASK_OVERDUE".into(),
            channel: "EMAIL".into(),
            enabled: true,
            settings,
            unsubscribe_token: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn object_settings_convert() {
        let pref = NotificationPreference::try_from(row(serde_json::json!({"digestFrequency": "DAILY"})))
            .unwrap();
        assert_eq!(pref.settings["digestFrequency"], "DAILY");
    }

    #[test]
    fn non_object_settings_are_rejected() {
        assert!(NotificationPreference::try_from(row(serde_json::json!([1, 2]))).is_err());
    }
}
