use chrono::Utc;
use serde_json::Value;
use store::{
    NewNotification, NotificationId, NotificationRecord, NotificationStatus, NotificationStore,
    Pagination,
};

use super::channel::{DeliveryChannel, EmailMessage};
use super::{CreateNotification, LOW_STOCK, ORDER_STATUS};
use crate::error::{DomainError, Result};
use crate::validation::ValidationError;

/// Recipient of low-stock alerts unless configured otherwise.
pub const DEFAULT_INVENTORY_MANAGER_EMAIL: &str = "inventory_manager@example.com";

fn text(data: &Value, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Renders a stored notification into the email it should produce.
///
/// Returns None when there is nothing to deliver: unknown types, and order
/// updates without a recipient.
pub fn render(notification: &NotificationRecord, manager_email: &str) -> Option<EmailMessage> {
    let data = &notification.data;
    match notification.kind.as_str() {
        LOW_STOCK => Some(EmailMessage {
            recipient: manager_email.to_string(),
            subject: "Low Stock Alert".to_string(),
            body: format!(
                "Product ID {} is running low. Current quantity: {}, Threshold: {}",
                text(data, "product_id"),
                text(data, "current_quantity"),
                text(data, "threshold"),
            ),
        }),
        ORDER_STATUS => {
            let recipient = data
                .get("recipient")
                .and_then(Value::as_str)
                .filter(|r| !r.is_empty())?;
            let order_id = text(data, "order_id");
            Some(EmailMessage {
                recipient: recipient.to_string(),
                subject: format!("Order #{order_id} Status Update"),
                body: format!(
                    "Your order #{order_id} has been {}.",
                    text(data, "status")
                ),
            })
        }
        _ => None,
    }
}

/// Service for storing and dispatching notifications.
pub struct NotificationService<S: NotificationStore, C: DeliveryChannel> {
    store: S,
    channel: C,
    manager_email: String,
}

impl<S: NotificationStore, C: DeliveryChannel> NotificationService<S, C> {
    pub fn new(store: S, channel: C) -> Self {
        Self::with_manager_email(store, channel, DEFAULT_INVENTORY_MANAGER_EMAIL)
    }

    pub fn with_manager_email(store: S, channel: C, manager_email: impl Into<String>) -> Self {
        Self {
            store,
            channel,
            manager_email: manager_email.into(),
        }
    }

    /// Stores a notification as `pending`. Delivery happens in [`process`].
    ///
    /// [`process`]: Self::process
    #[tracing::instrument(skip(self, request), fields(kind = %request.kind))]
    pub async fn create(&self, request: CreateNotification) -> Result<NotificationRecord> {
        if request.kind.trim().is_empty() {
            return Err(ValidationError::new("type", "must not be empty").into());
        }
        let record = self
            .store
            .insert_notification(NewNotification {
                kind: request.kind,
                data: request.data,
            })
            .await?;
        tracing::info!(notification_id = %record.id, "Notification stored");
        Ok(record)
    }

    pub async fn get(&self, id: NotificationId) -> Result<NotificationRecord> {
        self.store
            .get_notification(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Notification", id))
    }

    pub async fn list(
        &self,
        page: Pagination,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<NotificationRecord>> {
        Ok(self.store.list_notifications(page, status).await?)
    }

    /// Renders and delivers a stored notification, then records the result
    /// as `sent` or `failed`.
    #[tracing::instrument(skip(self))]
    pub async fn process(&self, id: NotificationId) -> Result<NotificationRecord> {
        let notification = self.get(id).await?;

        let delivery = match render(&notification, &self.manager_email) {
            Some(message) => self.channel.send_email(&message).await,
            None => {
                tracing::debug!(kind = %notification.kind, "Nothing to deliver");
                Ok(())
            }
        };

        let updated = match delivery {
            Ok(()) => {
                metrics::counter!("notifications_sent_total").increment(1);
                self.store.mark_notification_sent(id, Utc::now()).await?
            }
            Err(e) => {
                metrics::counter!("notifications_failed_total").increment(1);
                tracing::error!(error = %e, "Notification delivery failed");
                self.store.mark_notification_failed(id, e.to_string()).await?
            }
        };
        updated.ok_or_else(|| DomainError::not_found("Notification", id))
    }

    /// Puts a notification back to `pending` so it can be processed again.
    #[tracing::instrument(skip(self))]
    pub async fn resend(&self, id: NotificationId) -> Result<NotificationRecord> {
        self.store
            .reset_notification(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Notification", id))
    }
}
