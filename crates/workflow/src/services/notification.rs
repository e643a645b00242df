//! Notification collaborator.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::CreateNotification;
use reqwest::Client;
use serde_json::Value;

use super::join_url;
use crate::error::{Result, WorkflowError};

/// Trait for posting notifications. Delivery is asynchronous on the
/// receiving side; a successful call only means the notification was
/// accepted.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, kind: &str, data: Value) -> Result<()>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, kind: &str, data: Value) -> Result<()> {
        (**self).notify(kind, data).await
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    posted: Vec<CreateNotification>,
    unavailable: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Notifications accepted so far, oldest first.
    pub fn posted(&self) -> Vec<CreateNotification> {
        self.state.read().unwrap().posted.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, kind: &str, data: Value) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.unavailable {
            return Err(WorkflowError::unavailable("notification", "connection refused"));
        }
        state.posted.push(CreateNotification {
            kind: kind.to_string(),
            data,
        });
        Ok(())
    }
}

/// Notifier against the notification service (`POST /notifications`).
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    #[tracing::instrument(skip(self, data))]
    async fn notify(&self, kind: &str, data: Value) -> Result<()> {
        let response = self
            .client
            .post(join_url(&self.base_url, "/notifications"))
            .json(&CreateNotification {
                kind: kind.to_string(),
                data,
            })
            .send()
            .await
            .map_err(|e| WorkflowError::unavailable("notification", e))?;

        if !response.status().is_success() {
            return Err(WorkflowError::UnexpectedStatus {
                service: "notification",
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
