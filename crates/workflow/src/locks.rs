//! Per-order serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use store::OrderId;
use tokio::sync::OwnedMutexGuard;

/// Keyed async mutexes, one per order id.
///
/// Fulfillment and status updates for the same order take the same lock,
/// so they never interleave. Different orders never contend. Entries are
/// dropped once no task holds or waits on them.
#[derive(Debug, Clone, Default)]
pub struct OrderLocks {
    inner: Arc<Mutex<HashMap<OrderId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `order_id`.
    pub async fn lock(&self, order_id: OrderId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|id, m| *id == order_id || Arc::strong_count(m) > 1);
            map.entry(order_id).or_default().clone()
        };
        mutex.lock_owned().await
    }

    /// Number of orders currently tracked.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
