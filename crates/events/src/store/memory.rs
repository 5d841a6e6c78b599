//! In-memory stores.
//!
//! Each store keeps its state behind one `parking_lot` lock, so every
//! operation (in particular every status transition) is atomic with respect
//! to the others. Used by tests and single-node deployments without a
//! database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mfgops_core::channels::Channel;
use mfgops_core::notification::{
    NewNotification, Notification, NotificationStatus, NotificationType, StatusChange,
};
use mfgops_core::preference::{merge_settings, NotificationPreference, PreferenceUpsert};
use mfgops_core::query::{NotificationFilter, NotificationStats};
use mfgops_core::templates::{NewTemplate, NotificationTemplate, TemplateFilter, TemplateUpdate};
use mfgops_core::types::{DbId, TenantId, UserId};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use super::{Directory, NotificationStore, PreferenceStore, StoreResult, TemplateStore};
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Default)]
struct NotificationState {
    last_id: DbId,
    records: BTreeMap<DbId, Notification>,
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    state: Mutex<NotificationState>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record verbatim, keeping ids unique.
    ///
    /// Lets fixtures start from any status, retry count or creation time.
    pub fn put(&self, record: Notification) {
        let mut state = self.state.lock();
        state.last_id = state.last_id.max(record.id);
        state.records.insert(record.id, record);
    }

    /// Snapshot of every record, ordered by id.
    pub fn all(&self) -> Vec<Notification> {
        self.state.lock().records.values().cloned().collect()
    }
}

fn is_read_in_app(n: &Notification) -> bool {
    n.channel == Channel::InApp
        && matches!(n.status, NotificationStatus::Read | NotificationStatus::Acknowledged)
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, new: &NewNotification) -> StoreResult<Notification> {
        let mut state = self.state.lock();
        state.last_id += 1;
        let record = Notification {
            id: state.last_id,
            tenant_id: new.tenant_id.clone(),
            user_id: new.user_id.clone(),
            notification_type: new.notification_type,
            channel: new.channel,
            priority: new.priority,
            status: new.status,
            title: new.title.clone(),
            message: new.message.clone(),
            data: new.data.clone(),
            metadata: new.metadata.clone(),
            template_id: new.template_id.clone(),
            group_id: new.group_id.clone(),
            scheduled_for: new.scheduled_for,
            sent_at: None,
            read_at: None,
            acknowledged_at: None,
            expires_at: new.expires_at,
            retry_count: 0,
            last_error: None,
            actions: new.actions.clone(),
            created_at: Utc::now(),
        };
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: DbId) -> StoreResult<Option<Notification>> {
        Ok(self.state.lock().records.get(&id).cloned())
    }

    async fn transition(&self, id: DbId, change: &StatusChange) -> StoreResult<Option<Notification>> {
        let mut state = self.state.lock();
        let Some(record) = state.records.get_mut(&id) else {
            return Ok(None);
        };
        if !change.expected_sources().contains(&record.status) {
            return Ok(None);
        }
        change.apply(record);
        Ok(Some(record.clone()))
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        tenant_id: &str,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>> {
        let state = self.state.lock();
        let mut matching: Vec<Notification> = state
            .records
            .values()
            .filter(|n| n.user_id == user_id && n.tenant_id == tenant_id && filter.matches(n))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }

    async fn unread_count(&self, user_id: &str, tenant_id: &str) -> StoreResult<i64> {
        let state = self.state.lock();
        Ok(state
            .records
            .values()
            .filter(|n| n.user_id == user_id && n.tenant_id == tenant_id && n.status.is_unread())
            .count() as i64)
    }

    async fn mark_all_read(&self, user_id: &str, tenant_id: &str, at: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let change = StatusChange::to(NotificationStatus::Read).with_read_at(at);
        let mut updated = 0;
        for n in state.records.values_mut() {
            if n.user_id == user_id
                && n.tenant_id == tenant_id
                && n.channel == Channel::InApp
                && n.status == NotificationStatus::Delivered
            {
                change.apply(n);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_owned(&self, id: DbId, user_id: &str) -> StoreResult<bool> {
        let mut state = self.state.lock();
        match state.records.get(&id) {
            Some(n) if n.user_id == user_id => {
                state.records.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_retryable(
        &self,
        tenant_id: &str,
        max_retry: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Notification>> {
        let state = self.state.lock();
        Ok(state
            .records
            .values()
            .filter(|n| {
                n.tenant_id == tenant_id
                    && n.status == NotificationStatus::Failed
                    && n.retry_count < max_retry
                    && n.expires_at.map_or(true, |at| at > now)
            })
            .cloned()
            .collect())
    }

    async fn count_exhausted(&self, tenant_id: &str, max_retry: i32) -> StoreResult<i64> {
        let state = self.state.lock();
        Ok(state
            .records
            .values()
            .filter(|n| {
                n.tenant_id == tenant_id
                    && n.status == NotificationStatus::Failed
                    && n.retry_count >= max_retry
            })
            .count() as i64)
    }

    async fn expire_due(&self, tenant_id: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let mut expired = 0;
        for n in state.records.values_mut() {
            if n.tenant_id == tenant_id && n.is_expired_at(now) {
                n.status = NotificationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn list_due_queued(&self, tenant_id: &str, now: DateTime<Utc>) -> StoreResult<Vec<Notification>> {
        let state = self.state.lock();
        Ok(state
            .records
            .values()
            .filter(|n| {
                n.tenant_id == tenant_id
                    && n.status == NotificationStatus::Queued
                    && n.scheduled_for.map_or(true, |at| at <= now)
                    && n.expires_at.map_or(true, |at| at > now)
            })
            .cloned()
            .collect())
    }

    async fn delete_read_before(&self, tenant_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let before = state.records.len();
        state
            .records
            .retain(|_, n| !(n.tenant_id == tenant_id && is_read_in_app(n) && n.created_at < cutoff));
        Ok((before - state.records.len()) as u64)
    }

    async fn stats(&self, tenant_id: &str, user_id: Option<&str>) -> StoreResult<NotificationStats> {
        let state = self.state.lock();
        let mut stats = NotificationStats::default();
        state
            .records
            .values()
            .filter(|n| n.tenant_id == tenant_id && user_id.map_or(true, |u| n.user_id == u))
            .for_each(|n| stats.record(n));
        Ok(stats)
    }

    async fn tenants(&self) -> StoreResult<Vec<TenantId>> {
        let state = self.state.lock();
        let mut tenants: Vec<TenantId> = state.records.values().map(|n| n.tenant_id.clone()).collect();
        tenants.sort();
        tenants.dedup();
        Ok(tenants)
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

type PreferenceKey = (UserId, TenantId, NotificationType, Channel);

#[derive(Default)]
struct PreferenceState {
    last_id: DbId,
    rows: BTreeMap<PreferenceKey, NotificationPreference>,
}

#[derive(Default)]
pub struct MemoryPreferenceStore {
    state: Mutex<PreferenceState>,
    unavailable: AtomicBool,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("preference store offline".into()));
        }
        Ok(())
    }
}

fn key(user_id: &str, tenant_id: &str, t: NotificationType, c: Channel) -> PreferenceKey {
    (user_id.to_string(), tenant_id.to_string(), t, c)
}

impl PreferenceState {
    fn insert(&mut self, user_id: &str, tenant_id: &str, input: &PreferenceUpsert) -> NotificationPreference {
        self.last_id += 1;
        let now = Utc::now();
        let row = NotificationPreference {
            id: self.last_id,
            user_id: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            notification_type: input.notification_type,
            channel: input.channel,
            enabled: input.enabled,
            settings: input.settings.clone(),
            unsubscribe_token: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(
            key(user_id, tenant_id, input.notification_type, input.channel),
            row.clone(),
        );
        row
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn find(
        &self,
        user_id: &str,
        tenant_id: &str,
        notification_type: NotificationType,
        channel: Channel,
    ) -> StoreResult<Option<NotificationPreference>> {
        self.check()?;
        let state = self.state.lock();
        Ok(state.rows.get(&key(user_id, tenant_id, notification_type, channel)).cloned())
    }

    async fn list_for_user(&self, user_id: &str, tenant_id: &str) -> StoreResult<Vec<NotificationPreference>> {
        self.check()?;
        let state = self.state.lock();
        Ok(state
            .rows
            .values()
            .filter(|p| p.user_id == user_id && p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn upsert(
        &self,
        user_id: &str,
        tenant_id: &str,
        input: &PreferenceUpsert,
    ) -> StoreResult<NotificationPreference> {
        self.check()?;
        let mut state = self.state.lock();
        let k = key(user_id, tenant_id, input.notification_type, input.channel);
        if let Some(row) = state.rows.get_mut(&k) {
            row.enabled = input.enabled;
            row.settings = merge_settings(&row.settings, &input.settings);
            row.updated_at = Utc::now();
            return Ok(row.clone());
        }
        Ok(state.insert(user_id, tenant_id, input))
    }

    async fn insert_if_absent(&self, user_id: &str, tenant_id: &str, input: &PreferenceUpsert) -> StoreResult<bool> {
        self.check()?;
        let mut state = self.state.lock();
        let k = key(user_id, tenant_id, input.notification_type, input.channel);
        if state.rows.contains_key(&k) {
            return Ok(false);
        }
        state.insert(user_id, tenant_id, input);
        Ok(true)
    }

    async fn set_enabled_all(&self, user_id: &str, tenant_id: &str, enabled: bool) -> StoreResult<u64> {
        self.check()?;
        let mut state = self.state.lock();
        let mut updated = 0;
        for row in state.rows.values_mut() {
            if row.user_id == user_id && row.tenant_id == tenant_id {
                row.enabled = enabled;
                row.updated_at = Utc::now();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn merge_channel_settings(
        &self,
        user_id: &str,
        tenant_id: &str,
        channel: Channel,
        patch: &Map<String, Value>,
    ) -> StoreResult<u64> {
        self.check()?;
        let mut state = self.state.lock();
        let mut updated = 0;
        for row in state.rows.values_mut() {
            if row.user_id == user_id && row.tenant_id == tenant_id && row.channel == channel {
                row.settings = merge_settings(&row.settings, patch);
                row.updated_at = Utc::now();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn set_unsubscribe_token(&self, user_id: &str, channel: Channel, token: &str) -> StoreResult<u64> {
        self.check()?;
        let mut state = self.state.lock();
        let mut updated = 0;
        for row in state.rows.values_mut() {
            if row.user_id == user_id && row.channel == channel {
                row.unsubscribe_token = Some(token.to_string());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn redeem_unsubscribe_token(&self, user_id: &str, channel: Channel, token: &str) -> StoreResult<u64> {
        self.check()?;
        let mut state = self.state.lock();
        let mut updated = 0;
        for row in state.rows.values_mut() {
            if row.user_id == user_id
                && row.channel == channel
                && row.unsubscribe_token.as_deref() == Some(token)
            {
                row.enabled = false;
                row.updated_at = Utc::now();
                updated += 1;
            }
        }
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: Mutex<BTreeMap<String, NotificationTemplate>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn build_template(tenant_id: &str, id: &str, input: &NewTemplate) -> NotificationTemplate {
    let now = Utc::now();
    NotificationTemplate {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        code: input.code.clone(),
        name: input.name.clone(),
        notification_type: input.notification_type,
        channel: input.channel,
        subject: input.subject.clone(),
        body: input.body.clone(),
        variables: input.variables.clone(),
        is_active: input.is_active,
        styling: input.styling.clone(),
        metadata: input.metadata.clone(),
        created_at: now,
        updated_at: now,
    }
}

fn conflict(
    templates: &BTreeMap<String, NotificationTemplate>,
    tenant_id: &str,
    id: &str,
    code: &str,
) -> Option<&'static str> {
    if templates.contains_key(id) {
        return Some("notification_templates_pkey");
    }
    templates
        .values()
        .any(|t| t.tenant_id == tenant_id && t.code == code)
        .then_some("uq_notification_templates_tenant_code")
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn create(&self, tenant_id: &str, id: &str, input: &NewTemplate) -> StoreResult<NotificationTemplate> {
        let mut templates = self.templates.lock();
        if let Some(constraint) = conflict(&templates, tenant_id, id, &input.code) {
            return Err(StoreError::Duplicate(constraint.to_string()));
        }
        let template = build_template(tenant_id, id, input);
        templates.insert(id.to_string(), template.clone());
        Ok(template)
    }

    async fn insert_if_absent(&self, tenant_id: &str, id: &str, input: &NewTemplate) -> StoreResult<bool> {
        let mut templates = self.templates.lock();
        if conflict(&templates, tenant_id, id, &input.code).is_some() {
            return Ok(false);
        }
        templates.insert(id.to_string(), build_template(tenant_id, id, input));
        Ok(true)
    }

    async fn find_by_id(&self, tenant_id: &str, id: &str) -> StoreResult<Option<NotificationTemplate>> {
        let templates = self.templates.lock();
        Ok(templates.get(id).filter(|t| t.tenant_id == tenant_id).cloned())
    }

    async fn find_by_code(&self, tenant_id: &str, code: &str) -> StoreResult<Option<NotificationTemplate>> {
        let templates = self.templates.lock();
        Ok(templates
            .values()
            .find(|t| t.tenant_id == tenant_id && t.code == code)
            .cloned())
    }

    async fn list_active(&self, tenant_id: &str, filter: &TemplateFilter) -> StoreResult<Vec<NotificationTemplate>> {
        let templates = self.templates.lock();
        let mut matching: Vec<NotificationTemplate> = templates
            .values()
            .filter(|t| t.tenant_id == tenant_id && filter.matches(t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(matching)
    }

    async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        input: &TemplateUpdate,
    ) -> StoreResult<Option<NotificationTemplate>> {
        let mut templates = self.templates.lock();
        let Some(template) = templates.get_mut(id).filter(|t| t.tenant_id == tenant_id) else {
            return Ok(None);
        };
        input.apply(template);
        template.updated_at = Utc::now();
        Ok(Some(template.clone()))
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> StoreResult<bool> {
        let mut templates = self.templates.lock();
        let owned = templates.get(id).is_some_and(|t| t.tenant_id == tenant_id);
        if owned {
            templates.remove(id);
        }
        Ok(owned)
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Fixed role membership and email addresses.
#[derive(Default)]
pub struct StaticDirectory {
    roles: RwLock<HashMap<(TenantId, String), Vec<UserId>>>,
    emails: RwLock<HashMap<UserId, String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(self, tenant_id: &str, role: &str, users: &[&str]) -> Self {
        self.add_role_members(tenant_id, role, users);
        self
    }

    pub fn with_email(self, user_id: &str, email: &str) -> Self {
        self.set_email(user_id, email);
        self
    }

    pub fn add_role_members(&self, tenant_id: &str, role: &str, users: &[&str]) {
        let mut roles = self.roles.write();
        let members = roles
            .entry((tenant_id.to_string(), role.to_string()))
            .or_default();
        for user in users {
            if !members.iter().any(|m| m == user) {
                members.push(user.to_string());
            }
        }
    }

    pub fn set_email(&self, user_id: &str, email: &str) {
        self.emails.write().insert(user_id.to_string(), email.to_string());
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn users_with_role(&self, tenant_id: &str, role: &str) -> StoreResult<Vec<UserId>> {
        let roles = self.roles.read();
        Ok(roles
            .get(&(tenant_id.to_string(), role.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn email_address_of(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(self.emails.read().get(user_id).cloned())
    }
}
