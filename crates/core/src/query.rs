//! Listing filters, paging and aggregate statistics for notifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channels::Channel;
use crate::notification::{Notification, NotificationStatus};

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;

/// Clamp a user-provided limit to `[1, max]`.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Filters for a user's notification list (`?status=&channel=&unreadOnly=&limit=&offset=`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    pub status: Option<NotificationStatus>,
    pub channel: Option<Channel>,
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl NotificationFilter {
    pub fn limit(&self) -> i64 {
        clamp_limit(self.limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        clamp_offset(self.offset)
    }

    /// In-memory equivalent of the SQL `WHERE` clause (paging excluded).
    pub fn matches(&self, n: &Notification) -> bool {
        self.status.map_or(true, |s| s == n.status)
            && self.channel.map_or(true, |c| c == n.channel)
            && (!self.unread_only || n.status.is_unread())
    }
}

/// Aggregate counts over a tenant's (or one user's) notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_channel: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub unread: i64,
    /// FAILED records that have used up every retry.
    pub permanently_failed: i64,
}

impl NotificationStats {
    /// Fold one record into the counts.
    pub fn record(&mut self, n: &Notification) {
        self.total += 1;
        *self.by_status.entry(n.status.to_string()).or_default() += 1;
        *self.by_channel.entry(n.channel.to_string()).or_default() += 1;
        *self.by_type.entry(n.notification_type.to_string()).or_default() += 1;
        if n.status.is_unread() {
            self.unread += 1;
        }
        if n.is_permanently_failed() {
            self.permanently_failed += 1;
        }
    }
}
