//! Order creation and fulfillment.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{CreateOrder, DomainError, ORDER_STATUS, OrderService, OrderStatusNotice};
use store::{
    NewOrderLine, OrderId, OrderLineRecord, OrderRecord, OrderStatus, OrderStore, ProductId,
};

use crate::error::{Result, WorkflowError};
use crate::locks::OrderLocks;
use crate::services::{InventoryClient, Notifier, ProductLookup};
use crate::state::{FailureReason, FulfillmentOutcome, PartialFailurePolicy};

/// Something that can run the fulfillment procedure for an order.
#[async_trait]
pub trait Fulfill: Send + Sync {
    async fn fulfill(&self, order_id: OrderId) -> Result<FulfillmentOutcome>;
}

/// Coordinates the order tables with the product, inventory and
/// notification services.
///
/// The coordinator creates orders with price snapshots and drives the
/// fulfillment procedure: check every line, decrement every line, then
/// mark the order and notify the customer. Fulfillment and status updates
/// for the same order are serialized through [`OrderLocks`].
pub struct OrderWorkflow<S, P, I, N>
where
    S: OrderStore,
    P: ProductLookup,
    I: InventoryClient,
    N: Notifier,
{
    orders: OrderService<S>,
    products: P,
    inventory: I,
    notifier: Arc<N>,
    locks: OrderLocks,
    policy: PartialFailurePolicy,
}

impl<S, P, I, N> OrderWorkflow<S, P, I, N>
where
    S: OrderStore,
    P: ProductLookup,
    I: InventoryClient,
    N: Notifier + 'static,
{
    /// Creates a new workflow with the default partial failure policy.
    pub fn new(store: S, products: P, inventory: I, notifier: N) -> Self {
        Self {
            orders: OrderService::new(store),
            products,
            inventory,
            notifier: Arc::new(notifier),
            locks: OrderLocks::new(),
            policy: PartialFailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PartialFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read access to the order tables.
    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    /// Creates a `pending` order whose lines carry each product's current
    /// price.
    ///
    /// If any product does not resolve, the order row is deleted again and
    /// the call fails naming that product. The same happens when the lines
    /// cannot be stored. Fulfillment is not started here; callers enqueue it
    /// once this returns.
    #[tracing::instrument(skip(self, request), fields(customer_email = %request.customer_email))]
    pub async fn create_order(&self, request: CreateOrder) -> Result<OrderRecord> {
        let validated = request.validate().map_err(DomainError::from)?;
        let order = self.orders.open(validated.customer).await?;

        let mut lines: Vec<NewOrderLine> = Vec::with_capacity(validated.lines.len());
        for line in validated.lines {
            let product = match self.products.get_product(line.product_id).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::error!(product_id = %line.product_id, error = %e, "Product lookup failed");
                    None
                }
            };
            let Some(product) = product else {
                self.orders.discard(order.id).await?;
                return Err(WorkflowError::ProductNotFound(line.product_id));
            };
            lines.push(line.priced(product.price));
        }

        if let Err(e) = self.orders.add_lines(order.id, lines).await {
            tracing::error!(order_id = %order.id, error = %e, "Storing order lines failed");
            self.orders.discard(order.id).await?;
            return Err(e.into());
        }
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, "Order created");

        Ok(self.orders.get(order.id).await?)
    }

    /// Runs the fulfillment procedure once.
    ///
    /// Only a `pending` order is fulfilled; any other status is reported as
    /// [`FulfillmentOutcome::Skipped`] without touching stock, so running a
    /// job twice never decrements twice.
    #[tracing::instrument(skip(self))]
    pub async fn process_order(&self, order_id: OrderId) -> Result<FulfillmentOutcome> {
        let started = std::time::Instant::now();
        let _guard = self.locks.lock(order_id).await;

        let outcome = match self.orders.get(order_id).await {
            Ok(order) if order.status != OrderStatus::Pending => {
                tracing::info!(status = %order.status, "Order is not pending, skipping");
                FulfillmentOutcome::Skipped {
                    status: order.status,
                }
            }
            Ok(order) => self.fulfill_pending(&order).await?,
            Err(DomainError::NotFound { .. }) => {
                tracing::warn!("Order to fulfill no longer exists");
                FulfillmentOutcome::OrderMissing
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("fulfillment_outcomes_total", "outcome" => outcome.label())
            .increment(1);
        metrics::histogram!("fulfillment_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    async fn fulfill_pending(&self, order: &OrderRecord) -> Result<FulfillmentOutcome> {
        if let Some(line) = self.first_short_line(&order.items).await {
            tracing::warn!(product_id = %line.product_id, "Insufficient inventory");
            return self
                .finish(
                    order,
                    FulfillmentOutcome::Failed(FailureReason::InsufficientStock {
                        product_id: line.product_id,
                    }),
                )
                .await;
        }

        let mut applied: Vec<&OrderLineRecord> = Vec::new();
        let mut failed = Vec::new();
        for line in &order.items {
            match self
                .inventory
                .adjust(line.product_id, -line.quantity, false)
                .await
            {
                Ok(remaining) => {
                    tracing::debug!(product_id = %line.product_id, remaining, "Stock decremented");
                    applied.push(line);
                }
                Err(e) => {
                    tracing::error!(product_id = %line.product_id, error = %e, "Stock decrement failed");
                    failed.push(line.product_id);
                }
            }
        }

        let outcome = if failed.is_empty() {
            FulfillmentOutcome::Processed {
                failed_decrements: Vec::new(),
            }
        } else {
            match self.policy {
                PartialFailurePolicy::Tolerate => {
                    tracing::warn!(?failed, "Partial decrement tolerated");
                    FulfillmentOutcome::Processed {
                        failed_decrements: failed,
                    }
                }
                PartialFailurePolicy::Compensate => {
                    let compensated = self.compensate(&applied).await;
                    FulfillmentOutcome::Failed(FailureReason::PartialDecrement {
                        failed,
                        compensated,
                    })
                }
            }
        };
        self.finish(order, outcome).await
    }

    /// Checks lines in order and returns the first one without enough
    /// stock. Lines after it are not checked. A check that errors counts as
    /// insufficient.
    async fn first_short_line<'a>(
        &self,
        lines: &'a [OrderLineRecord],
    ) -> Option<&'a OrderLineRecord> {
        for line in lines {
            match self.inventory.check(line.product_id, line.quantity).await {
                Ok(true) => {}
                Ok(false) => return Some(line),
                Err(e) => {
                    tracing::error!(product_id = %line.product_id, error = %e, "Inventory check failed");
                    return Some(line);
                }
            }
        }
        None
    }

    /// Re-increments every applied decrement. Returns the products that
    /// were restored.
    async fn compensate(&self, applied: &[&OrderLineRecord]) -> Vec<ProductId> {
        let mut restored = Vec::with_capacity(applied.len());
        for line in applied {
            match self
                .inventory
                .adjust(line.product_id, line.quantity, true)
                .await
            {
                Ok(_) => restored.push(line.product_id),
                Err(e) => {
                    tracing::error!(product_id = %line.product_id, error = %e, "Compensation failed");
                }
            }
        }
        restored
    }

    /// Writes the final status if the order is still `pending`, then
    /// notifies the customer.
    async fn finish(
        &self,
        order: &OrderRecord,
        outcome: FulfillmentOutcome,
    ) -> Result<FulfillmentOutcome> {
        let status = match outcome {
            FulfillmentOutcome::Processed { .. } => OrderStatus::Processed,
            _ => OrderStatus::Failed,
        };

        if !self
            .orders
            .transition(order.id, OrderStatus::Pending, status)
            .await?
        {
            let current = self.orders.get(order.id).await?.status;
            tracing::warn!(%current, "Order left pending while being fulfilled");
            return Ok(FulfillmentOutcome::Skipped { status: current });
        }

        tracing::info!(order_id = %order.id, %status, "Order fulfillment finished");
        self.notify_status(order, status).await;
        Ok(outcome)
    }

    /// Overwrites an order's status and schedules the customer
    /// notification. Any of the known statuses is accepted from any other.
    ///
    /// The notification is sent from a spawned task after the order lock is
    /// released.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderRecord> {
        let guard = self.locks.lock(order_id).await;
        let order = self
            .orders
            .set_status(order_id, status)
            .await
            .map_err(|e| match e {
                DomainError::NotFound { .. } => WorkflowError::OrderNotFound(order_id),
                other => other.into(),
            })?;
        drop(guard);

        let notifier = self.notifier.clone();
        let recipient = order.customer_email.clone();
        tokio::spawn(async move {
            send_status_notice(notifier.as_ref(), order_id, recipient, status).await;
        });
        Ok(order)
    }

    async fn notify_status(&self, order: &OrderRecord, status: OrderStatus) {
        send_status_notice(
            self.notifier.as_ref(),
            order.id,
            order.customer_email.clone(),
            status,
        )
        .await;
    }
}

async fn send_status_notice<N: Notifier + ?Sized>(
    notifier: &N,
    order_id: OrderId,
    recipient: String,
    status: OrderStatus,
) {
    let notice = OrderStatusNotice {
        order_id,
        status,
        recipient,
    };
    let data = match serde_json::to_value(&notice) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, "Could not encode status notice");
            return;
        }
    };
    if let Err(e) = notifier.notify(ORDER_STATUS, data).await {
        tracing::error!(%order_id, error = %e, "Failed to send order notification");
    }
}

#[async_trait]
impl<S, P, I, N> Fulfill for OrderWorkflow<S, P, I, N>
where
    S: OrderStore,
    P: ProductLookup,
    I: InventoryClient,
    N: Notifier + 'static,
{
    async fn fulfill(&self, order_id: OrderId) -> Result<FulfillmentOutcome> {
        self.process_order(order_id).await
    }
}
