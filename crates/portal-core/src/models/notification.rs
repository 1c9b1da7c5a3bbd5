use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque notification identifier assigned by the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NotificationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single entry of the notification feed.
///
/// Entries are immutable apart from the read flag and its timestamp; identity
/// is the `id` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEntry {
    pub id: NotificationId,
    /// Payload rendered by the UI, never inspected by the engine
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationEntry {
    pub fn unread(id: impl Into<NotificationId>, content: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            content,
            is_read: false,
            read_at: None,
        }
    }

    pub fn read(id: impl Into<NotificationId>, content: serde_json::Value, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            content,
            is_read: true,
            read_at: Some(at),
        }
    }
}

/// Upward-facing view of the feed, published on every state change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub notifications: Vec<NotificationEntry>,
    pub unread_count: u64,
    pub loading: bool,
    pub error: Option<String>,
    pub has_more: bool,
}

impl FeedSnapshot {
    pub fn get(&self, id: &NotificationId) -> Option<&NotificationEntry> {
        self.notifications.iter().find(|n| &n.id == id)
    }
}
