//! Notification record model, vocabulary enums and the delivery state machine.
//!
//! This module lives in `core` (zero internal deps) so the dispatcher, the
//! repositories and the HTTP layer all agree on one set of transition rules.

use serde::{Deserialize, Serialize};

use crate::channels::Channel;
use crate::error::CoreError;
use crate::types::{DbId, TemplateId, TenantId, Timestamp, UserId};

/// A FAILED record with this many retries behind it is never retried again.
pub const MAX_RETRY_COUNT: i32 = 3;

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

text_enum! {
    /// Business occurrences that can trigger a notification.
    ///
    /// This vocabulary is the integration contract with the domain modules
    /// (orders, inventory, production, tasks, quality, maintenance) and must
    /// stay stable.
    pub enum NotificationType {
        OrderCreated => "ORDER_CREATED",
        OrderUpdated => "ORDER_UPDATED",
        OrderDelayed => "ORDER_DELAYED",
        OrderCompleted => "ORDER_COMPLETED",
        OrderCancelled => "ORDER_CANCELLED",
        InventoryLowStock => "INVENTORY_LOW_STOCK",
        InventoryOutOfStock => "INVENTORY_OUT_OF_STOCK",
        ProductionStarted => "PRODUCTION_STARTED",
        ProductionCompleted => "PRODUCTION_COMPLETED",
        ProductionDelayed => "PRODUCTION_DELAYED",
        EquipmentBreakdown => "EQUIPMENT_BREAKDOWN",
        EquipmentMaintenanceDue => "EQUIPMENT_MAINTENANCE_DUE",
        QualityCheckFailed => "QUALITY_CHECK_FAILED",
        QualityCheckPassed => "QUALITY_CHECK_PASSED",
        TaskAssigned => "TASK_ASSIGNED",
        TaskOverdue => "TASK_OVERDUE",
        TaskCompleted => "TASK_COMPLETED",
        MaintenanceScheduled => "MAINTENANCE_SCHEDULED",
        MaintenanceCompleted => "MAINTENANCE_COMPLETED",
        SystemAlert => "SYSTEM_ALERT",
        SystemAnnouncement => "SYSTEM_ANNOUNCEMENT",
    }
}

impl NotificationType {
    /// Coarse grouping used as the default `metadata.category`.
    pub fn category(&self) -> &'static str {
        use NotificationType::*;
        match self {
            OrderCreated | OrderUpdated | OrderDelayed | OrderCompleted | OrderCancelled => "order",
            InventoryLowStock | InventoryOutOfStock => "inventory",
            ProductionStarted | ProductionCompleted | ProductionDelayed => "production",
            EquipmentBreakdown | EquipmentMaintenanceDue => "equipment",
            QualityCheckFailed | QualityCheckPassed => "quality",
            TaskAssigned | TaskOverdue | TaskCompleted => "task",
            MaintenanceScheduled | MaintenanceCompleted => "maintenance",
            SystemAlert | SystemAnnouncement => "system",
        }
    }
}

text_enum! {
    /// Delivery urgency. Ordered from least to most urgent.
    #[derive(Default)]
    pub enum Priority {
        Low => "LOW",
        #[default]
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

text_enum! {
    /// Visual weight of an inline notification action.
    #[derive(Default)]
    pub enum ActionStyle {
        Primary => "primary",
        #[default]
        Secondary => "secondary",
        Danger => "danger",
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

text_enum! {
    /// Delivery lifecycle of a notification record.
    pub enum NotificationStatus {
        /// Created, not yet handed to a channel sender.
        Pending => "PENDING",
        /// Deferred until `scheduled_for` (explicit schedule or quiet hours).
        Queued => "QUEUED",
        Sent => "SENT",
        /// The channel confirmed delivery synchronously (e.g. in-app).
        Delivered => "DELIVERED",
        Read => "READ",
        Acknowledged => "ACKNOWLEDGED",
        Failed => "FAILED",
        Expired => "EXPIRED",
        Cancelled => "CANCELLED",
    }
}

impl NotificationStatus {
    /// Returns the set of statuses reachable from `self`.
    ///
    /// Terminal states (Acknowledged, Expired, Cancelled) return an empty
    /// slice.
    pub fn valid_transitions(&self) -> &'static [NotificationStatus] {
        use NotificationStatus::*;
        match self {
            Pending => &[Sent, Delivered, Failed, Expired, Cancelled],
            Queued => &[Pending, Expired, Cancelled],
            Sent => &[Delivered, Read, Acknowledged],
            Delivered => &[Read, Acknowledged],
            Read => &[Acknowledged],
            // Retry path; bounded by MAX_RETRY_COUNT at the call site.
            // Cancelled when the recipient opted out before the retry.
            Failed => &[Pending, Cancelled],
            Acknowledged | Expired | Cancelled => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition_to(&self, to: NotificationStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning a [`CoreError::Conflict`] for invalid ones.
    pub fn validate_transition(&self, to: NotificationStatus) -> Result<(), CoreError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Invalid notification transition: {self} -> {to}"
            )))
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Every status that can legally move to `to`.
    ///
    /// Used to build the `status = ANY(...)` guard of atomic updates.
    pub fn sources_of(to: NotificationStatus) -> Vec<NotificationStatus> {
        NotificationStatus::ALL
            .iter()
            .copied()
            .filter(|from| from.can_transition_to(to))
            .collect()
    }

    /// Statuses that count as "unread" for an inbox.
    pub fn is_unread(&self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Delivered)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Optional descriptive metadata attached to a notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// An inline action button rendered with the notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub label: String,
    pub action: String,
    #[serde(default)]
    pub style: ActionStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// One delivery attempt to one recipient on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: DbId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub priority: Priority,
    pub status: NotificationStatus,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NotificationMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    pub retry_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<NotificationAction>>,
    pub created_at: Timestamp,
}

impl Notification {
    /// A FAILED record that has not yet used up its retries.
    pub fn is_retry_eligible(&self) -> bool {
        self.status == NotificationStatus::Failed && self.retry_count < MAX_RETRY_COUNT
    }

    /// A FAILED record that will never be retried again.
    pub fn is_permanently_failed(&self) -> bool {
        self.status == NotificationStatus::Failed && self.retry_count >= MAX_RETRY_COUNT
    }

    /// PENDING or QUEUED with an `expires_at` at or before `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        matches!(
            self.status,
            NotificationStatus::Pending | NotificationStatus::Queued
        ) && self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Insert payload for a new notification record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub priority: Priority,
    /// Either [`NotificationStatus::Pending`] or [`NotificationStatus::Queued`].
    pub status: NotificationStatus,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub metadata: Option<NotificationMetadata>,
    pub template_id: Option<TemplateId>,
    pub group_id: Option<String>,
    pub scheduled_for: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub actions: Option<Vec<NotificationAction>>,
}

/// A single atomic status transition applied to one record.
///
/// Timestamps follow "set at most once" semantics: stores only write
/// `read_at`, `acknowledged_at` and `sent_at` when the column is still NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: NotificationStatus,
    pub sent_at: Option<Timestamp>,
    pub read_at: Option<Timestamp>,
    pub acknowledged_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub increment_retry: bool,
}

impl StatusChange {
    pub fn to(status: NotificationStatus) -> Self {
        Self {
            status,
            sent_at: None,
            read_at: None,
            acknowledged_at: None,
            last_error: None,
            increment_retry: false,
        }
    }

    pub fn with_sent_at(mut self, at: Timestamp) -> Self {
        self.sent_at = Some(at);
        self
    }

    pub fn with_read_at(mut self, at: Timestamp) -> Self {
        self.read_at = Some(at);
        self
    }

    pub fn with_acknowledged_at(mut self, at: Timestamp) -> Self {
        self.acknowledged_at = Some(at);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }

    pub fn with_retry_increment(mut self) -> Self {
        self.increment_retry = true;
        self
    }

    /// Statuses a record must currently be in for this change to apply.
    pub fn expected_sources(&self) -> Vec<NotificationStatus> {
        NotificationStatus::sources_of(self.status)
    }

    /// Apply the change to an in-memory record.
    ///
    /// Callers are responsible for checking the source status first.
    pub fn apply(&self, record: &mut Notification) {
        record.status = self.status;
        if record.sent_at.is_none() {
            record.sent_at = self.sent_at;
        }
        if record.read_at.is_none() {
            record.read_at = self.read_at;
        }
        if record.acknowledged_at.is_none() {
            record.acknowledged_at = self.acknowledged_at;
        }
        if let Some(err) = &self.last_error {
            record.last_error = Some(err.clone());
        }
        if self.increment_retry {
            record.retry_count += 1;
        }
    }
}
