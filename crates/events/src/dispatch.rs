//! Event fan-out.
//!
//! [`Dispatcher::send`] expands one [`SendRequest`] into (recipient, channel)
//! pairs and processes them with bounded parallelism. Each pair is gated by
//! preferences, persisted, and handed to its channel sender under a timeout.
//! Pair failures are recorded on the notification and in the
//! [`BatchResult`]; only request-level problems (bad shape, unknown
//! template, directory failure) make `send` return an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use mfgops_core::channels::Channel;
use mfgops_core::error::CoreError;
use mfgops_core::notification::{
    NewNotification, Notification, NotificationAction, NotificationMetadata, NotificationStatus,
    NotificationType, Priority, StatusChange,
};
use mfgops_core::payload::EventPayload;
use mfgops_core::types::{DbId, TemplateId, TenantId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::delivery::{DeliveryContext, DeliveryResult, SenderRegistry};
use crate::error::NotifyError;
use crate::preferences::{Gate, PreferenceService};
use crate::store::{Directory, NotificationStore};
use crate::templates::TemplateService;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One business event to notify about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Filled from the caller identity when sent over HTTP.
    #[serde(default)]
    pub tenant_id: TenantId,
    #[serde(default)]
    pub recipients: Vec<UserId>,
    /// Role names expanded through the directory.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Defaults to in-app only.
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub priority: Priority,
    pub title: Option<String>,
    pub message: Option<String>,
    pub template_id: Option<TemplateId>,
    #[serde(default)]
    pub template_data: Map<String, Value>,
    pub payload: Option<EventPayload>,
    /// Stored as-is when no typed payload is given.
    pub data: Option<Value>,
    pub metadata: Option<NotificationMetadata>,
    pub actions: Option<Vec<NotificationAction>>,
    pub scheduled_for: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub group_id: Option<String>,
}

impl SendRequest {
    pub fn new(tenant_id: &str, notification_type: NotificationType) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            recipients: Vec::new(),
            roles: Vec::new(),
            notification_type,
            channels: Vec::new(),
            priority: Priority::default(),
            title: None,
            message: None,
            template_id: None,
            template_data: Map::new(),
            payload: None,
            data: None,
            metadata: None,
            actions: None,
            scheduled_for: None,
            expires_at: None,
            group_id: None,
        }
    }

    pub fn to(mut self, users: &[&str]) -> Self {
        self.recipients.extend(users.iter().map(|u| u.to_string()));
        self
    }

    pub fn to_roles(mut self, roles: &[&str]) -> Self {
        self.roles.extend(roles.iter().map(|r| r.to_string()));
        self
    }

    pub fn via(mut self, channels: &[Channel]) -> Self {
        self.channels.extend_from_slice(channels);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_content(mut self, title: &str, message: &str) -> Self {
        self.title = Some(title.to_string());
        self.message = Some(message.to_string());
        self
    }

    pub fn with_template(mut self, template_id: &str, data: Map<String, Value>) -> Self {
        self.template_id = Some(template_id.to_string());
        self.template_data = data;
        self
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn scheduled_for(mut self, at: Timestamp) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn expires_at(mut self, at: Timestamp) -> Self {
        self.expires_at = Some(at);
        self
    }

    fn validate(&self) -> Result<(), NotifyError> {
        if self.tenant_id.trim().is_empty() {
            return Err(NotifyError::validation("tenantId is required"));
        }
        if self.recipients.is_empty() && self.roles.is_empty() {
            return Err(NotifyError::validation("At least one recipient or role is required"));
        }
        if self.recipients.iter().any(|r| r.trim().is_empty()) {
            return Err(NotifyError::validation("Recipient ids must not be empty"));
        }
        if self.template_id.is_none() {
            let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
            if !has(&self.title) || !has(&self.message) {
                return Err(NotifyError::validation(
                    "Either templateId or both title and message are required",
                ));
            }
        }
        if let (Some(scheduled), Some(expires)) = (self.scheduled_for, self.expires_at) {
            if expires <= scheduled {
                return Err(NotifyError::validation("expiresAt must be after scheduledFor"));
            }
        }
        Ok(())
    }

    /// Channels in request order, duplicates removed, in-app when empty.
    fn effective_channels(&self) -> Vec<Channel> {
        if self.channels.is_empty() {
            return vec![Channel::InApp];
        }
        let mut seen = HashSet::new();
        self.channels.iter().copied().filter(|c| seen.insert(*c)).collect()
    }

    /// Variables for template rendering: payload fields overlaid by explicit
    /// template data.
    fn render_data(&self) -> Map<String, Value> {
        let mut data = self
            .payload
            .as_ref()
            .map(EventPayload::to_template_data)
            .unwrap_or_default();
        for (k, v) in &self.template_data {
            data.insert(k.clone(), v.clone());
        }
        data
    }

    fn stored_data(&self) -> Option<Value> {
        match &self.payload {
            Some(payload) => serde_json::to_value(payload).ok().or_else(|| self.data.clone()),
            None => self.data.clone(),
        }
    }

    fn stored_metadata(&self) -> NotificationMetadata {
        let mut metadata = self.metadata.clone().unwrap_or_default();
        if metadata.category.is_none() {
            metadata.category = Some(self.notification_type.category().to_string());
        }
        if let Some((entity_type, entity_id)) = self.payload.as_ref().and_then(EventPayload::entity_ref) {
            if metadata.entity_type.is_none() {
                metadata.entity_type = Some(entity_type.to_string());
                metadata.entity_id = Some(entity_id.to_string());
            }
        }
        metadata
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of one (recipient, channel) pair that passed gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResult {
    pub user_id: UserId,
    pub channel: Channel,
    /// Absent when the record could not be created.
    pub notification_id: Option<DbId>,
    pub status: NotificationStatus,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PairResult {
    fn failed(user_id: &str, channel: Channel, notification_id: Option<DbId>, error: String) -> Self {
        Self {
            user_id: user_id.to_string(),
            channel,
            notification_id,
            status: NotificationStatus::Failed,
            success: false,
            error: Some(error),
        }
    }

    fn from_record(record: &Notification, success: bool, error: Option<String>) -> Self {
        Self {
            user_id: record.user_id.clone(),
            channel: record.channel,
            notification_id: Some(record.id),
            status: record.status,
            success,
            error,
        }
    }
}

/// Aggregate outcome of one `send`.
///
/// `success_count + failure_count == total == results.len()`; skipped pairs
/// are not counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<PairResult>,
}

impl BatchResult {
    fn from_results(results: Vec<PairResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            success_count,
            failure_count: results.len() - success_count,
            results,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Content shared by every pair of one request.
struct Prepared {
    title: String,
    message: String,
    data: Option<Value>,
    metadata: NotificationMetadata,
}

pub struct Dispatcher {
    notifications: Arc<dyn NotificationStore>,
    preferences: Arc<PreferenceService>,
    templates: Arc<TemplateService>,
    directory: Arc<dyn Directory>,
    senders: SenderRegistry,
    concurrency: usize,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        preferences: Arc<PreferenceService>,
        templates: Arc<TemplateService>,
        directory: Arc<dyn Directory>,
        senders: SenderRegistry,
        concurrency: usize,
        send_timeout: Duration,
    ) -> Self {
        Self {
            notifications,
            preferences,
            templates,
            directory,
            senders,
            concurrency: concurrency.max(1),
            send_timeout,
        }
    }

    /// Notify every recipient of `request` on every requested channel.
    pub async fn send(&self, request: &SendRequest) -> Result<BatchResult, NotifyError> {
        request.validate()?;
        let prepared = self.prepare(request).await?;
        let recipients = self.resolve_recipients(request).await?;
        let channels = request.effective_channels();

        let pairs: Vec<(usize, UserId, Channel)> = recipients
            .iter()
            .flat_map(|user| channels.iter().map(move |c| (user.clone(), *c)))
            .enumerate()
            .map(|(i, (user, channel))| (i, user, channel))
            .collect();

        let prepared = &prepared;
        let mut outcomes: Vec<(usize, Option<PairResult>)> = stream::iter(pairs)
            .map(|(i, user, channel)| async move {
                let outcome = self.process_pair(request, prepared, &user, channel).await;
                (i, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(i, _)| *i);

        let batch = BatchResult::from_results(outcomes.into_iter().filter_map(|(_, r)| r).collect());
        tracing::info!(
            tenant_id = %request.tenant_id,
            notification_type = %request.notification_type,
            recipients = recipients.len(),
            total = batch.total,
            success = batch.success_count,
            failed = batch.failure_count,
            "Notification batch dispatched"
        );
        Ok(batch)
    }

    async fn prepare(&self, request: &SendRequest) -> Result<Prepared, NotifyError> {
        let (title, message) = match &request.template_id {
            Some(id) => {
                let template = self.templates.get(&request.tenant_id, id).await?;
                if !template.is_active {
                    return Err(CoreError::Validation(format!("Template '{id}' is inactive")).into());
                }
                let rendered = self.templates.render(&template, &request.render_data())?;
                (rendered.subject, rendered.body)
            }
            None => (
                request.title.clone().unwrap_or_default(),
                request.message.clone().unwrap_or_default(),
            ),
        };
        Ok(Prepared {
            title,
            message,
            data: request.stored_data(),
            metadata: request.stored_metadata(),
        })
    }

    /// Explicit recipients first, then role members, each user once.
    async fn resolve_recipients(&self, request: &SendRequest) -> Result<Vec<UserId>, NotifyError> {
        let mut seen = HashSet::new();
        let mut users = Vec::new();
        for user in &request.recipients {
            if seen.insert(user.clone()) {
                users.push(user.clone());
            }
        }
        for role in &request.roles {
            for user in self.directory.users_with_role(&request.tenant_id, role).await? {
                if seen.insert(user.clone()) {
                    users.push(user);
                }
            }
        }
        Ok(users)
    }

    /// `None` when preferences skip the pair.
    async fn process_pair(
        &self,
        request: &SendRequest,
        prepared: &Prepared,
        user_id: &str,
        channel: Channel,
    ) -> Option<PairResult> {
        let now = Utc::now();
        let gate = match self
            .preferences
            .gate(user_id, &request.tenant_id, request.notification_type, channel, request.priority, now)
            .await
        {
            Ok(gate) => gate,
            Err(e) => {
                tracing::warn!(user_id, %channel, error = %e, "Preference lookup failed");
                return Some(PairResult::failed(
                    user_id,
                    channel,
                    None,
                    format!("Preference lookup failed: {e}"),
                ));
            }
        };

        let (defer_until, contact_override) = match gate {
            Gate::Skip { reason } => {
                tracing::debug!(user_id, %channel, reason, "Pair skipped");
                return None;
            }
            Gate::Send { contact_override } => (None, contact_override),
            Gate::Defer { until, contact_override } => (Some(until), contact_override),
        };

        let scheduled_for = match (request.scheduled_for.filter(|at| *at > now), defer_until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let status = if scheduled_for.is_some() {
            NotificationStatus::Queued
        } else {
            NotificationStatus::Pending
        };

        let new = NewNotification {
            tenant_id: request.tenant_id.clone(),
            user_id: user_id.to_string(),
            notification_type: request.notification_type,
            channel,
            priority: request.priority,
            status,
            title: prepared.title.clone(),
            message: prepared.message.clone(),
            data: prepared.data.clone(),
            metadata: Some(prepared.metadata.clone()),
            template_id: request.template_id.clone(),
            group_id: request.group_id.clone(),
            scheduled_for: scheduled_for.or(request.scheduled_for),
            expires_at: request.expires_at,
            actions: request.actions.clone(),
        };

        let record = match self.notifications.create(&new).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(user_id, %channel, error = %e, "Failed to persist notification");
                return Some(PairResult::failed(
                    user_id,
                    channel,
                    None,
                    format!("Failed to persist notification: {e}"),
                ));
            }
        };

        if record.status == NotificationStatus::Queued {
            tracing::debug!(notification_id = record.id, user_id, %channel, "Notification queued");
            return Some(PairResult::from_record(&record, true, None));
        }

        Some(self.deliver(record, &DeliveryContext { contact_override }).await)
    }

    /// Send a PENDING record through its channel and store the outcome.
    pub async fn deliver(&self, record: Notification, ctx: &DeliveryContext) -> PairResult {
        let result = match self.senders.get(record.channel) {
            None => DeliveryResult::failed(format!("No sender registered for channel {}", record.channel)),
            Some(sender) => match tokio::time::timeout(self.send_timeout, sender.send(&record, ctx)).await {
                Ok(result) => result,
                Err(_) => DeliveryResult::failed(format!(
                    "{} delivery timed out after {}ms",
                    record.channel,
                    self.send_timeout.as_millis()
                )),
            },
        };

        let change = if result.success {
            StatusChange::to(result.status).with_sent_at(result.delivered_at.unwrap_or_else(Utc::now))
        } else {
            StatusChange::to(NotificationStatus::Failed)
                .with_error(result.error.clone().unwrap_or_else(|| "Delivery failed".into()))
        };

        if let Some(error) = &result.error {
            tracing::warn!(
                notification_id = record.id,
                user_id = %record.user_id,
                channel = %record.channel,
                retry_count = record.retry_count,
                error = %error,
                "Notification delivery failed"
            );
        }

        match self.notifications.transition(record.id, &change).await {
            Ok(Some(updated)) => PairResult::from_record(&updated, result.success, result.error),
            Ok(None) => {
                let error = format!("Notification {} changed state during delivery", record.id);
                tracing::warn!(notification_id = record.id, "{error}");
                PairResult::failed(&record.user_id, record.channel, Some(record.id), error)
            }
            Err(e) => {
                tracing::warn!(notification_id = record.id, error = %e, "Failed to record delivery outcome");
                PairResult::failed(
                    &record.user_id,
                    record.channel,
                    Some(record.id),
                    format!("Failed to record delivery outcome: {e}"),
                )
            }
        }
    }
}
