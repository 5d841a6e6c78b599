//! Preference management and per-pair gating.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mfgops_core::channels::Channel;
use mfgops_core::error::CoreError;
use mfgops_core::notification::{NotificationType, Priority};
use mfgops_core::preference::{NotificationPreference, PreferenceSettings, PreferenceUpsert, QuietHours};
use mfgops_core::seeds::default_preferences;
use mfgops_core::unsubscribe::{self, UnsubscribeClaims};
use serde_json::{Map, Value};

use crate::config::MissingPreferencePolicy;
use crate::error::NotifyError;
use crate::store::PreferenceStore;

/// Outcome of checking one (recipient, channel) pair against preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Deliver now.
    Send { contact_override: Option<String> },
    /// Persist as QUEUED and deliver at `until`.
    Defer {
        until: DateTime<Utc>,
        contact_override: Option<String>,
    },
    /// Create no record.
    Skip { reason: &'static str },
}

pub struct PreferenceService {
    store: Arc<dyn PreferenceStore>,
    secret: Vec<u8>,
    policy: MissingPreferencePolicy,
}

impl PreferenceService {
    pub fn new(store: Arc<dyn PreferenceStore>, secret: Vec<u8>, policy: MissingPreferencePolicy) -> Self {
        Self { store, secret, policy }
    }

    pub async fn get(
        &self,
        user_id: &str,
        tenant_id: &str,
        notification_type: NotificationType,
        channel: Channel,
    ) -> Result<NotificationPreference, NotifyError> {
        self.store
            .find(user_id, tenant_id, notification_type, channel)
            .await?
            .ok_or_else(|| CoreError::not_found("NotificationPreference", format!("{notification_type}/{channel}")).into())
    }

    pub async fn list(&self, user_id: &str, tenant_id: &str) -> Result<Vec<NotificationPreference>, NotifyError> {
        Ok(self.store.list_for_user(user_id, tenant_id).await?)
    }

    pub async fn upsert(
        &self,
        user_id: &str,
        tenant_id: &str,
        input: &PreferenceUpsert,
    ) -> Result<NotificationPreference, NotifyError> {
        input.validate()?;
        Ok(self.store.upsert(user_id, tenant_id, input).await?)
    }

    /// Upsert several rows. Every input is validated before any is written.
    pub async fn bulk_upsert(
        &self,
        user_id: &str,
        tenant_id: &str,
        inputs: &[PreferenceUpsert],
    ) -> Result<Vec<NotificationPreference>, NotifyError> {
        for input in inputs {
            input.validate()?;
        }
        let mut saved = Vec::with_capacity(inputs.len());
        for input in inputs {
            saved.push(self.store.upsert(user_id, tenant_id, input).await?);
        }
        Ok(saved)
    }

    /// Insert the default matrix rows the user does not have yet.
    pub async fn set_defaults(&self, user_id: &str, tenant_id: &str) -> Result<u64, NotifyError> {
        let mut inserted = 0;
        for row in default_preferences() {
            if self.store.insert_if_absent(user_id, tenant_id, &row).await? {
                inserted += 1;
            }
        }
        tracing::debug!(user_id, tenant_id, inserted, "Default preferences applied");
        Ok(inserted)
    }

    pub async fn enable_all(&self, user_id: &str, tenant_id: &str) -> Result<u64, NotifyError> {
        Ok(self.store.set_enabled_all(user_id, tenant_id, true).await?)
    }

    pub async fn disable_all(&self, user_id: &str, tenant_id: &str) -> Result<u64, NotifyError> {
        Ok(self.store.set_enabled_all(user_id, tenant_id, false).await?)
    }

    /// Merge `patch` into the settings of every row of `channel`.
    pub async fn update_channel_settings(
        &self,
        user_id: &str,
        tenant_id: &str,
        channel: Channel,
        patch: &Map<String, Value>,
    ) -> Result<u64, NotifyError> {
        PreferenceSettings::from_map(patch)?;
        Ok(self
            .store
            .merge_channel_settings(user_id, tenant_id, channel, patch)
            .await?)
    }

    /// Issue a token that disables `channel` for the user when redeemed.
    ///
    /// The token replaces any earlier one on the user's rows for the channel.
    pub async fn issue_unsubscribe_token(&self, user_id: &str, channel: Channel) -> Result<String, NotifyError> {
        let claims = UnsubscribeClaims {
            user_id: user_id.to_string(),
            channel,
            issued_at_epoch_ms: Utc::now().timestamp_millis(),
        };
        let token = unsubscribe::issue(&self.secret, &claims);
        let rows = self.store.set_unsubscribe_token(user_id, channel, &token).await?;
        if rows == 0 {
            return Err(CoreError::not_found("NotificationPreference", format!("{user_id}/{channel}")).into());
        }
        Ok(token)
    }

    /// Disable the rows the token was issued for. Returns `false` for any
    /// malformed, forged, stale or unknown token.
    pub async fn redeem_unsubscribe_token(&self, token: &str) -> bool {
        let claims = match unsubscribe::decode(&self.secret, token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected unsubscribe token");
                return false;
            }
        };
        match self
            .store
            .redeem_unsubscribe_token(&claims.user_id, claims.channel, token)
            .await
        {
            Ok(rows) => {
                if rows > 0 {
                    tracing::info!(user_id = %claims.user_id, channel = %claims.channel, rows, "Unsubscribed");
                }
                rows > 0
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unsubscribe redemption failed");
                false
            }
        }
    }

    /// The quiet-hours window configured for `channel`, if any.
    pub async fn quiet_hours(
        &self,
        user_id: &str,
        tenant_id: &str,
        channel: Channel,
    ) -> Result<Option<QuietHours>, NotifyError> {
        let rows = self.store.list_for_user(user_id, tenant_id).await?;
        Ok(rows
            .iter()
            .filter(|p| p.channel == channel)
            .filter_map(|p| p.typed_settings().ok())
            .find_map(|s| s.quiet_hours))
    }

    /// Decide what happens to one pair.
    pub async fn gate(
        &self,
        user_id: &str,
        tenant_id: &str,
        notification_type: NotificationType,
        channel: Channel,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<Gate, NotifyError> {
        let mut pref = self.store.find(user_id, tenant_id, notification_type, channel).await?;
        if pref.is_none() && self.policy == MissingPreferencePolicy::SeedDefaults {
            self.set_defaults(user_id, tenant_id).await?;
            pref = self.store.find(user_id, tenant_id, notification_type, channel).await?;
        }

        let Some(pref) = pref else {
            return Ok(Gate::Skip { reason: "no preference" });
        };
        if !pref.enabled {
            return Ok(Gate::Skip { reason: "disabled" });
        }

        let settings = pref.typed_settings().unwrap_or_else(|e| {
            tracing::warn!(user_id, %channel, error = %e, "Ignoring unreadable preference settings");
            PreferenceSettings::default()
        });
        let contact_override = settings.contact_override;

        if channel.is_out_of_band() && priority != Priority::Critical {
            if let Some(until) = settings.quiet_hours.and_then(|q| q.active_until(now)) {
                return Ok(Gate::Defer { until, contact_override });
            }
        }
        Ok(Gate::Send { contact_override })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPreferenceStore;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn service(policy: MissingPreferencePolicy) -> (PreferenceService, Arc<MemoryPreferenceStore>) {
        let store = Arc::new(MemoryPreferenceStore::new());
        (PreferenceService::new(store.clone(), b"secret".to_vec(), policy), store)
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn missing_preference_is_skipped_under_deny() {
        let (svc, _) = service(MissingPreferencePolicy::Deny);
        let gate = svc
            .gate("u1", "t1", NotificationType::OrderCreated, Channel::InApp, Priority::Medium, at(9, 0))
            .await
            .unwrap();
        assert_eq!(gate, Gate::Skip { reason: "no preference" });
    }

    #[tokio::test]
    async fn seed_defaults_policy_seeds_on_first_use() {
        let (svc, store) = service(MissingPreferencePolicy::SeedDefaults);
        let gate = svc
            .gate("u1", "t1", NotificationType::OrderCreated, Channel::InApp, Priority::Medium, at(9, 0))
            .await
            .unwrap();
        assert_matches!(gate, Gate::Send { contact_override: None });
        assert_eq!(store.list_for_user("u1", "t1").await.unwrap().len(), default_preferences().len());
    }

    #[tokio::test]
    async fn quiet_hours_defer_out_of_band_only() {
        let (svc, _) = service(MissingPreferencePolicy::Deny);
        svc.set_defaults("u1", "t1").await.unwrap();
        let mut patch = Map::new();
        patch.insert("quietHours".into(), serde_json::json!({"start": "22:00", "end": "06:00"}));
        svc.update_channel_settings("u1", "t1", Channel::Email, &patch).await.unwrap();
        svc.update_channel_settings("u1", "t1", Channel::InApp, &patch).await.unwrap();

        let email = svc
            .gate("u1", "t1", NotificationType::OrderDelayed, Channel::Email, Priority::High, at(23, 0))
            .await
            .unwrap();
        assert_eq!(
            email,
            Gate::Defer {
                until: Utc.with_ymd_and_hms(2026, 3, 11, 6, 0, 0).unwrap(),
                contact_override: None
            }
        );

        let critical = svc
            .gate("u1", "t1", NotificationType::OrderDelayed, Channel::Email, Priority::Critical, at(23, 0))
            .await
            .unwrap();
        assert_matches!(critical, Gate::Send { .. });

        let in_app = svc
            .gate("u1", "t1", NotificationType::OrderCreated, Channel::InApp, Priority::Low, at(23, 0))
            .await
            .unwrap();
        assert_matches!(in_app, Gate::Send { .. });

        let quiet = svc.quiet_hours("u1", "t1", Channel::Email).await.unwrap().unwrap();
        assert_eq!(quiet.start, "22:00");
        assert!(svc.quiet_hours("u1", "t1", Channel::WebSocket).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected() {
        let (svc, _) = service(MissingPreferencePolicy::Deny);
        let mut input = PreferenceUpsert::new(NotificationType::TaskOverdue, Channel::Email, true);
        input.settings.insert("quietHours".into(), serde_json::json!({"start": "25:00", "end": "06:00"}));
        let err = svc.upsert("u1", "t1", &input).await.unwrap_err();
        assert_matches!(err, NotifyError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn bulk_upsert_validates_before_writing() {
        let (svc, store) = service(MissingPreferencePolicy::Deny);
        let good = PreferenceUpsert::new(NotificationType::TaskOverdue, Channel::Email, true);
        let mut bad = PreferenceUpsert::new(NotificationType::TaskAssigned, Channel::Email, true);
        bad.settings.insert("quietHours".into(), Value::from("always"));

        assert!(svc.bulk_upsert("u1", "t1", &[good, bad]).await.is_err());
        assert!(store.list_for_user("u1", "t1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_defaults_is_idempotent() {
        let (svc, _) = service(MissingPreferencePolicy::Deny);
        let first = svc.set_defaults("u1", "t1").await.unwrap();
        assert_eq!(first as usize, default_preferences().len());
        assert_eq!(svc.set_defaults("u1", "t1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_missing_row_is_not_found() {
        let (svc, _) = service(MissingPreferencePolicy::Deny);
        let err = svc
            .get("u1", "t1", NotificationType::OrderCreated, Channel::Email)
            .await
            .unwrap_err();
        assert_matches!(err, NotifyError::Core(CoreError::NotFound { .. }));
    }
}
