//! Per-user, per-type, per-channel delivery preferences.
//!
//! Settings are stored as a JSON object so the store can shallow-merge
//! patches (`settings || patch` in Postgres). [`PreferenceSettings`] is the
//! typed view used when gating a delivery.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::channels::Channel;
use crate::error::CoreError;
use crate::notification::NotificationType;
use crate::types::{DbId, TenantId, Timestamp, UserId};

text_enum! {
    /// How often batched notifications are summarised for this channel.
    pub enum DigestFrequency {
        Immediate => "IMMEDIATE",
        Hourly => "HOURLY",
        Daily => "DAILY",
        Weekly => "WEEKLY",
    }
}

/// A stored preference row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreference {
    pub id: DbId,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub enabled: bool,
    pub settings: Map<String, Value>,
    #[serde(skip_serializing)]
    pub unsubscribe_token: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl NotificationPreference {
    /// Typed view over the stored settings object.
    pub fn typed_settings(&self) -> Result<PreferenceSettings, CoreError> {
        PreferenceSettings::from_map(&self.settings)
    }
}

/// Create-or-update payload for one `(type, channel)` preference.
///
/// On update, `enabled` is overwritten and `settings` is shallow-merged into
/// the stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceUpsert {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub enabled: bool,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl PreferenceUpsert {
    pub fn new(notification_type: NotificationType, channel: Channel, enabled: bool) -> Self {
        Self {
            notification_type,
            channel,
            enabled,
            settings: Map::new(),
        }
    }

    /// Reject settings that would not decode when read back.
    pub fn validate(&self) -> Result<(), CoreError> {
        PreferenceSettings::from_map(&self.settings).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Known keys of a preference's settings object. Unknown keys are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSettings {
    /// Address used instead of the directory's contact for this channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_frequency: Option<DigestFrequency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_filters: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PreferenceSettings {
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, CoreError> {
        let settings: Self = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| CoreError::Validation(format!("Invalid preference settings: {e}")))?;
        if let Some(quiet) = &settings.quiet_hours {
            quiet.validate()?;
        }
        Ok(settings)
    }
}

/// Shallow merge: top-level keys of `patch` replace those in `base`.
pub fn merge_settings(base: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

// ---------------------------------------------------------------------------
// Quiet hours
// ---------------------------------------------------------------------------

/// A daily local-time window during which out-of-band delivery is held back.
///
/// `start` and `end` are `HH:MM` in `timezone` (IANA name). A window whose
/// end is earlier than its start wraps past midnight; equal bounds describe
/// an empty window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    pub start: String,
    pub end: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn parse_clock(value: &str) -> Result<NaiveTime, CoreError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| CoreError::Validation(format!("Invalid quiet-hours time '{value}', expected HH:MM")))
}

impl QuietHours {
    pub fn new(start: &str, end: &str, timezone: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            timezone: timezone.to_string(),
        }
    }

    fn parts(&self) -> Result<(NaiveTime, NaiveTime, Tz), CoreError> {
        let tz: Tz = self
            .timezone
            .parse()
            .map_err(|_| CoreError::Validation(format!("Unknown timezone '{}'", self.timezone)))?;
        Ok((parse_clock(&self.start)?, parse_clock(&self.end)?, tz))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.parts().map(|_| ())
    }

    /// If `now` falls inside the window, the UTC instant at which it ends.
    pub fn active_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let (start, end, tz) = self.parts().ok()?;
        if start == end {
            return None;
        }

        let local = now.with_timezone(&tz);
        let time = local.time();
        let today = local.date_naive();

        let end_date = if start < end {
            if time < start || time >= end {
                return None;
            }
            today
        } else if time >= start {
            today.succ_opt()?
        } else if time < end {
            today
        } else {
            return None;
        };

        let naive_end = end_date.and_time(end);
        // A window ending inside a DST gap ends at the first valid instant after it.
        let end_local = tz
            .from_local_datetime(&naive_end)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive_end + Duration::hours(1))).earliest())?;
        Some(end_local.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn overnight_window_before_midnight_ends_next_day() {
        let q = QuietHours::new("22:00", "06:00", "UTC");
        assert_eq!(
            q.active_until(at("2026-05-01T23:30:00Z")),
            Some(at("2026-05-02T06:00:00Z"))
        );
    }

    #[test]
    fn overnight_window_after_midnight_ends_same_day() {
        let q = QuietHours::new("22:00", "06:00", "UTC");
        assert_eq!(
            q.active_until(at("2026-05-02T03:00:00Z")),
            Some(at("2026-05-02T06:00:00Z"))
        );
        assert_eq!(q.active_until(at("2026-05-02T06:00:00Z")), None);
        assert_eq!(q.active_until(at("2026-05-02T12:00:00Z")), None);
    }

    #[test]
    fn daytime_window() {
        let q = QuietHours::new("12:00", "13:00", "UTC");
        assert_eq!(
            q.active_until(at("2026-05-02T12:15:00Z")),
            Some(at("2026-05-02T13:00:00Z"))
        );
        assert_eq!(q.active_until(at("2026-05-02T11:59:00Z")), None);
    }

    #[test]
    fn window_is_evaluated_in_local_time() {
        // 22:00-06:00 Berlin (UTC+2 in May) covers 20:00-04:00 UTC.
        let q = QuietHours::new("22:00", "06:00", "Europe/Berlin");
        assert_eq!(
            q.active_until(at("2026-05-01T21:00:00Z")),
            Some(at("2026-05-02T04:00:00Z"))
        );
        assert_eq!(q.active_until(at("2026-05-01T19:00:00Z")), None);
    }

    #[test]
    fn empty_and_invalid_windows_never_defer() {
        let now = at("2026-05-01T12:00:00Z");
        assert_eq!(QuietHours::new("08:00", "08:00", "UTC").active_until(now), None);
        assert_eq!(QuietHours::new("8am", "17:00", "UTC").active_until(now), None);
        assert_eq!(QuietHours::new("08:00", "17:00", "Mars/Base").active_until(now), None);
    }

    #[test]
    fn settings_decode_known_and_keep_unknown_keys() {
        let s = PreferenceSettings::from_map(&map(json!({
            "contactOverride": "ops@plant.example",
            "digestFrequency": "DAILY",
            "quietHours": {"start": "22:00", "end": "06:00"},
            "sound": "chime"
        })))
        .unwrap();
        assert_eq!(s.contact_override.as_deref(), Some("ops@plant.example"));
        assert_eq!(s.digest_frequency, Some(DigestFrequency::Daily));
        assert_eq!(s.quiet_hours.unwrap().timezone, "UTC");
        assert_eq!(s.extra["sound"], "chime");
    }

    #[test]
    fn malformed_quiet_hours_are_rejected() {
        let err = PreferenceSettings::from_map(&map(json!({
            "quietHours": {"start": "25:00", "end": "06:00"}
        })))
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn merge_is_shallow() {
        let base = map(json!({"quietHours": {"start": "22:00", "end": "06:00"}, "sound": "chime"}));
        let patch = map(json!({"quietHours": {"start": "23:00", "end": "05:00"}}));
        let merged = merge_settings(&base, &patch);
        assert_eq!(merged["quietHours"], json!({"start": "23:00", "end": "05:00"}));
        assert_eq!(merged["sound"], "chime");
    }
}
