//! Notification service boundary: the trait the engine consumes and its
//! HTTP implementation.

pub mod http;
#[cfg(test)]
pub mod scripted;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::{NotificationEntry, NotificationId};

pub use http::HttpNotificationService;

/// Backend holding the authoritative notification feed.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// One page of the feed, most recent first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<NotificationEntry>, ServiceError>;

    async fn unread_count(&self) -> Result<u64, ServiceError>;

    /// Idempotent on the service side.
    async fn mark_read(&self, id: &NotificationId) -> Result<(), ServiceError>;
}

pub type DynNotificationService = Arc<dyn NotificationService>;
