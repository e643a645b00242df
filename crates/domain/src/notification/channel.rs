//! Delivery channels for rendered notifications.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// An email ready to hand to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// A channel refused or failed to deliver a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

/// Trait for sending rendered notifications.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<T: DeliveryChannel + ?Sized> DeliveryChannel for Arc<T> {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        (**self).send_email(message).await
    }
}

/// Channel that writes each message to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl DeliveryChannel for LogChannel {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            channel = "email",
            recipient = %message.recipient,
            subject = %message.subject,
            body = %message.body,
            "Notification delivered"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryChannelState {
    sent: Vec<EmailMessage>,
    fail_with: Option<String>,
}

/// In-memory channel for testing. Records every delivered message.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChannel {
    state: Arc<RwLock<InMemoryChannelState>>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following delivery fail with `error`, or succeed again
    /// with `None`.
    pub fn set_fail_with(&self, error: Option<&str>) {
        self.state.write().unwrap().fail_with = error.map(str::to_string);
    }

    /// Returns the messages delivered so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl DeliveryChannel for InMemoryChannel {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let mut state = self.state.write().unwrap();
        if let Some(error) = &state.fail_with {
            return Err(DeliveryError(error.clone()));
        }
        state.sent.push(message.clone());
        Ok(())
    }
}
