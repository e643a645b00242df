//! Notification outbox table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{NotificationId, NotificationStatus, Pagination, Result};

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a notification. New notifications start `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: String,
    pub data: serde_json::Value,
}

/// Storage for notifications and their delivery status.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: NewNotification)
    -> Result<NotificationRecord>;

    async fn get_notification(&self, id: NotificationId) -> Result<Option<NotificationRecord>>;

    /// Lists notifications in id order, optionally filtered by status.
    async fn list_notifications(
        &self,
        page: Pagination,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<NotificationRecord>>;

    /// Marks a notification delivered at `sent_at`.
    async fn mark_notification_sent(
        &self,
        id: NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<NotificationRecord>>;

    /// Marks a notification failed with the delivery error.
    async fn mark_notification_failed(
        &self,
        id: NotificationId,
        error: String,
    ) -> Result<Option<NotificationRecord>>;

    /// Puts a notification back to `pending`, clearing the error and
    /// `sent_at`.
    async fn reset_notification(&self, id: NotificationId) -> Result<Option<NotificationRecord>>;
}
