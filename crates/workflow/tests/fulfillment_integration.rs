//! Integration tests for order creation and fulfillment.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use domain::{CreateOrder, DomainError, OrderLineRequest};
use serde_json::Value;
use store::{
    InMemoryStore, NewOrder, NewOrderLine, OrderId, OrderLineRecord, OrderRecord, OrderStatus,
    OrderStore, Pagination, ProductId, StoreError,
};
use workflow::{
    FailureReason, FulfillmentOutcome, FulfillmentQueue, InMemoryInventoryClient,
    InMemoryNotifier, InMemoryProductLookup, JobState, Notifier, OrderWorkflow,
    PartialFailurePolicy, WorkflowError,
};

type TestWorkflow =
    OrderWorkflow<InMemoryStore, InMemoryProductLookup, InMemoryInventoryClient, InMemoryNotifier>;

struct TestHarness {
    workflow: Arc<TestWorkflow>,
    store: InMemoryStore,
    products: InMemoryProductLookup,
    inventory: InMemoryInventoryClient,
    notifier: InMemoryNotifier,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_policy(PartialFailurePolicy::Compensate)
    }

    fn with_policy(policy: PartialFailurePolicy) -> Self {
        let store = InMemoryStore::new();
        let products = InMemoryProductLookup::new();
        let inventory = InMemoryInventoryClient::new();
        let notifier = InMemoryNotifier::new();

        products.add_product(1, 10.0);
        products.add_product(2, 20.0);

        let workflow = OrderWorkflow::new(
            store.clone(),
            products.clone(),
            inventory.clone(),
            notifier.clone(),
        )
        .with_policy(policy);

        Self {
            workflow: Arc::new(workflow),
            store,
            products,
            inventory,
            notifier,
        }
    }

    fn request(lines: &[(i64, f64)]) -> CreateOrder {
        CreateOrder {
            customer_name: "Ada Lovelace".to_string(),
            customer_email: "ada@example.com".to_string(),
            items: lines
                .iter()
                .map(|(id, quantity)| OrderLineRequest {
                    product_id: ProductId::new(*id),
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    async fn create(&self, lines: &[(i64, f64)]) -> OrderId {
        self.workflow
            .create_order(Self::request(lines))
            .await
            .unwrap()
            .id
    }

    async fn status(&self, order_id: OrderId) -> OrderStatus {
        self.store.get_order(order_id).await.unwrap().unwrap().status
    }

    fn notified_statuses(&self) -> Vec<String> {
        self.notifier
            .posted()
            .into_iter()
            .map(|n| {
                assert_eq!(n.kind, "order_status");
                n.data["status"].as_str().unwrap().to_string()
            })
            .collect()
    }

    /// Status notifications are sent in the background after an update;
    /// polls until `count` have arrived.
    async fn wait_for_notices(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            if self.notifier.posted().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notified_statuses()
    }
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn lines_snapshot_product_prices() {
        let h = TestHarness::new();
        let order = h
            .workflow
            .create_order(TestHarness::request(&[(1, 5.0), (2, 3.0)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product_id, ProductId::new(1));
        assert_eq!(order.items[0].unit_price, 10.0);
        assert_eq!(order.items[1].unit_price, 20.0);

        // A later price change does not reach the stored lines.
        h.products.add_product(1, 99.0);
        let stored = h.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.items[0].unit_price, 10.0);
    }

    #[tokio::test]
    async fn creation_does_not_touch_inventory_or_notify() {
        let h = TestHarness::new();
        h.create(&[(1, 1.0)]).await;

        assert!(h.inventory.checks().is_empty());
        assert!(h.notifier.posted().is_empty());
    }

    #[tokio::test]
    async fn unknown_product_discards_the_order() {
        let h = TestHarness::new();
        let err = h
            .workflow
            .create_order(TestHarness::request(&[(1, 1.0), (7, 1.0)]))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::ProductNotFound(id) if id == ProductId::new(7)));
        assert_eq!(err.to_string(), "Product 7 not found");
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn unreachable_product_service_counts_as_missing() {
        let h = TestHarness::new();
        h.products.set_unavailable(true);

        let err = h
            .workflow
            .create_order(TestHarness::request(&[(1, 1.0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ProductNotFound(_)));
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_storage() {
        let h = TestHarness::new();
        let mut request = TestHarness::request(&[(1, 1.0)]);
        request.customer_email = "nope".to_string();

        let err = h.workflow.create_order(request).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::Validation(_))));
        assert!(h.products.lookups().is_empty());
        assert_eq!(h.store.order_count().await, 0);
    }

    /// Order store whose line inserts always fail.
    struct LineRejectingStore(InMemoryStore);

    #[async_trait]
    impl OrderStore for LineRejectingStore {
        async fn insert_order(&self, order: NewOrder) -> store::Result<OrderRecord> {
            self.0.insert_order(order).await
        }

        async fn insert_order_lines(
            &self,
            _order_id: OrderId,
            _lines: Vec<NewOrderLine>,
        ) -> store::Result<Vec<OrderLineRecord>> {
            Err(StoreError::Decode("order_items unavailable".to_string()))
        }

        async fn delete_order(&self, order_id: OrderId) -> store::Result<bool> {
            self.0.delete_order(order_id).await
        }

        async fn get_order(&self, order_id: OrderId) -> store::Result<Option<OrderRecord>> {
            self.0.get_order(order_id).await
        }

        async fn list_orders(&self, page: Pagination) -> store::Result<Vec<OrderRecord>> {
            self.0.list_orders(page).await
        }

        async fn list_orders_by_email(&self, email: &str) -> store::Result<Vec<OrderRecord>> {
            self.0.list_orders_by_email(email).await
        }

        async fn set_order_status(
            &self,
            order_id: OrderId,
            status: OrderStatus,
        ) -> store::Result<Option<OrderRecord>> {
            self.0.set_order_status(order_id, status).await
        }

        async fn transition_order_status(
            &self,
            order_id: OrderId,
            from: OrderStatus,
            to: OrderStatus,
        ) -> store::Result<bool> {
            self.0.transition_order_status(order_id, from, to).await
        }
    }

    #[tokio::test]
    async fn failed_line_insert_discards_the_order() {
        let store = InMemoryStore::new();
        let products = InMemoryProductLookup::new();
        products.add_product(1, 10.0);
        let workflow = OrderWorkflow::new(
            LineRejectingStore(store.clone()),
            products,
            InMemoryInventoryClient::new(),
            InMemoryNotifier::new(),
        );

        let err = workflow
            .create_order(TestHarness::request(&[(1, 1.0)]))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Domain(DomainError::Store(_))));
        assert_eq!(store.order_count().await, 0);
    }
}

mod fulfillment {
    use super::*;

    #[tokio::test]
    async fn sufficient_stock_processes_the_order() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        h.inventory.set_stock(2, 10.0);
        let order_id = h.create(&[(1, 5.0), (2, 3.0)]).await;

        let outcome = h.workflow.process_order(order_id).await.unwrap();

        assert_eq!(
            outcome,
            FulfillmentOutcome::Processed {
                failed_decrements: vec![]
            }
        );
        assert_eq!(h.status(order_id).await, OrderStatus::Processed);
        assert_eq!(
            h.inventory.adjustments(),
            vec![(ProductId::new(1), -5.0), (ProductId::new(2), -3.0)]
        );
        assert_eq!(h.inventory.stock(1), Some(5.0));
        assert_eq!(h.notified_statuses(), vec!["processed"]);

        let notice = &h.notifier.posted()[0].data;
        assert_eq!(notice["order_id"], order_id.as_i64());
        assert_eq!(notice["recipient"], "ada@example.com");
    }

    #[tokio::test]
    async fn short_stock_on_first_line_stops_all_checks() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 2.0);
        h.inventory.set_stock(2, 100.0);
        let order_id = h.create(&[(1, 5.0), (2, 3.0)]).await;

        let outcome = h.workflow.process_order(order_id).await.unwrap();

        assert_eq!(
            outcome,
            FulfillmentOutcome::Failed(FailureReason::InsufficientStock {
                product_id: ProductId::new(1)
            })
        );
        assert_eq!(h.status(order_id).await, OrderStatus::Failed);
        assert_eq!(h.inventory.checks(), vec![ProductId::new(1)]);
        assert!(h.inventory.adjustments().is_empty());
        assert_eq!(h.notified_statuses(), vec!["failed"]);
    }

    #[tokio::test]
    async fn short_stock_on_later_line_touches_nothing() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        let order_id = h.create(&[(1, 5.0), (2, 3.0)]).await;

        h.workflow.process_order(order_id).await.unwrap();

        assert_eq!(h.inventory.checks(), vec![ProductId::new(1), ProductId::new(2)]);
        assert!(h.inventory.adjustments().is_empty());
        assert_eq!(h.inventory.stock(1), Some(10.0));
        assert_eq!(h.status(order_id).await, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn unreachable_inventory_fails_the_order() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        h.inventory.set_unavailable(true);
        let order_id = h.create(&[(1, 1.0)]).await;

        let outcome = h.workflow.process_order(order_id).await.unwrap();
        assert!(matches!(outcome, FulfillmentOutcome::Failed(_)));
        assert_eq!(h.status(order_id).await, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn second_run_is_skipped() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        let order_id = h.create(&[(1, 4.0)]).await;

        h.workflow.process_order(order_id).await.unwrap();
        let again = h.workflow.process_order(order_id).await.unwrap();

        assert_eq!(
            again,
            FulfillmentOutcome::Skipped {
                status: OrderStatus::Processed
            }
        );
        assert_eq!(h.inventory.stock(1), Some(6.0));
        assert_eq!(h.notifier.posted().len(), 1);
    }

    #[tokio::test]
    async fn deleted_order_is_reported_missing() {
        let h = TestHarness::new();
        let outcome = h.workflow.process_order(OrderId::new(404)).await.unwrap();
        assert_eq!(outcome, FulfillmentOutcome::OrderMissing);
        assert!(h.notifier.posted().is_empty());
    }

    #[tokio::test]
    async fn partial_decrement_is_compensated() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        h.inventory.set_stock(2, 10.0);
        h.inventory.fail_adjustments_for(2);
        let order_id = h.create(&[(1, 5.0), (2, 3.0)]).await;

        let outcome = h.workflow.process_order(order_id).await.unwrap();

        assert_eq!(
            outcome,
            FulfillmentOutcome::Failed(FailureReason::PartialDecrement {
                failed: vec![ProductId::new(2)],
                compensated: vec![ProductId::new(1)],
            })
        );
        assert_eq!(h.inventory.stock(1), Some(10.0));
        assert_eq!(
            h.inventory.adjustments(),
            vec![(ProductId::new(1), -5.0), (ProductId::new(1), 5.0)]
        );
        assert_eq!(h.status(order_id).await, OrderStatus::Failed);
        assert_eq!(h.notified_statuses(), vec!["failed"]);
    }

    #[tokio::test]
    async fn partial_decrement_can_be_tolerated() {
        let h = TestHarness::with_policy(PartialFailurePolicy::Tolerate);
        h.inventory.set_stock(1, 10.0);
        h.inventory.set_stock(2, 10.0);
        h.inventory.fail_adjustments_for(1);
        let order_id = h.create(&[(1, 5.0), (2, 3.0)]).await;

        let outcome = h.workflow.process_order(order_id).await.unwrap();

        assert_eq!(
            outcome,
            FulfillmentOutcome::Processed {
                failed_decrements: vec![ProductId::new(1)]
            }
        );
        // The failing line does not stop the next decrement.
        assert_eq!(h.inventory.stock(2), Some(7.0));
        assert_eq!(h.status(order_id).await, OrderStatus::Processed);
    }

    #[tokio::test]
    async fn notifier_outage_does_not_change_the_outcome() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        h.notifier.set_unavailable(true);
        let order_id = h.create(&[(1, 1.0)]).await;

        let outcome = h.workflow.process_order(order_id).await.unwrap();
        assert!(matches!(outcome, FulfillmentOutcome::Processed { .. }));
        assert_eq!(h.status(order_id).await, OrderStatus::Processed);
    }
}

mod status_update {
    use super::*;

    #[tokio::test]
    async fn missing_order_has_no_side_effects() {
        let h = TestHarness::new();
        let err = h
            .workflow
            .update_status(OrderId::new(9), OrderStatus::Delivered)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::OrderNotFound(_)));
        assert!(h.notifier.posted().is_empty());
    }

    #[tokio::test]
    async fn overwrite_skips_intermediate_states_and_notifies() {
        let h = TestHarness::new();
        let order_id = h.create(&[(1, 1.0)]).await;

        let updated = h
            .workflow
            .update_status(order_id, OrderStatus::Delivered)
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Delivered);
        assert!(updated.updated_at.is_some());
        assert_eq!(h.wait_for_notices(1).await, vec!["delivered"]);
        assert!(h.inventory.checks().is_empty());
    }

    #[tokio::test]
    async fn updated_order_is_not_fulfilled_afterwards() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        let order_id = h.create(&[(1, 1.0)]).await;

        h.workflow
            .update_status(order_id, OrderStatus::Processing)
            .await
            .unwrap();
        let outcome = h.workflow.process_order(order_id).await.unwrap();

        assert_eq!(
            outcome,
            FulfillmentOutcome::Skipped {
                status: OrderStatus::Processing
            }
        );
        assert!(h.inventory.adjustments().is_empty());
    }

    /// Notifier that takes a while to answer before recording the notice.
    struct SlowNotifier {
        delay: Duration,
        inner: InMemoryNotifier,
    }

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn notify(&self, kind: &str, data: Value) -> workflow::Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.notify(kind, data).await
        }
    }

    #[tokio::test]
    async fn slow_notifier_does_not_delay_the_update() {
        let store = InMemoryStore::new();
        let products = InMemoryProductLookup::new();
        products.add_product(1, 10.0);
        let inventory = InMemoryInventoryClient::new();
        inventory.set_stock(1, 10.0);
        let recorded = InMemoryNotifier::new();
        let workflow = OrderWorkflow::new(
            store,
            products,
            inventory,
            SlowNotifier {
                delay: Duration::from_millis(500),
                inner: recorded.clone(),
            },
        );
        let order = workflow
            .create_order(TestHarness::request(&[(1, 1.0)]))
            .await
            .unwrap();

        let started = Instant::now();
        let updated = workflow
            .update_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Delivered);
        assert!(started.elapsed() < Duration::from_millis(250));
        assert!(recorded.posted().is_empty());

        // The order lock is already released for fulfillment.
        let outcome = tokio::time::timeout(
            Duration::from_millis(250),
            workflow.process_order(order.id),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            outcome,
            FulfillmentOutcome::Skipped {
                status: OrderStatus::Delivered
            }
        );

        for _ in 0..200 {
            if !recorded.posted().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let posted = recorded.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].data["status"], "delivered");
    }
}

mod queue {
    use super::*;

    #[tokio::test]
    async fn queued_job_fulfills_the_order() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        let queue = FulfillmentQueue::start(h.workflow.clone());

        let order_id = h.create(&[(1, 2.0)]).await;
        assert!(queue.enqueue(order_id));

        let job = tokio::time::timeout(Duration::from_secs(2), queue.wait(order_id))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            job.state,
            JobState::Completed {
                result: FulfillmentOutcome::Processed { .. }
            }
        ));
        assert_eq!(h.status(order_id).await, OrderStatus::Processed);
    }

    #[tokio::test]
    async fn jobs_for_different_orders_run_independently() {
        let h = TestHarness::new();
        h.inventory.set_stock(1, 10.0);
        h.inventory.set_stock(2, 1.0);
        let queue = FulfillmentQueue::start(h.workflow.clone());

        let ok = h.create(&[(1, 2.0)]).await;
        let short = h.create(&[(2, 5.0)]).await;
        queue.enqueue(ok);
        queue.enqueue(short);

        queue.wait(ok).await.unwrap();
        queue.wait(short).await.unwrap();
        assert_eq!(h.status(ok).await, OrderStatus::Processed);
        assert_eq!(h.status(short).await, OrderStatus::Failed);
    }
}

/// The worked example: lines [(1, 5), (2, 3)] priced 10.00 and 20.00, with
/// only 2 units of product 1 on hand.
#[tokio::test]
async fn worked_example() {
    let h = TestHarness::new();
    h.inventory.set_stock(1, 2.0);
    h.inventory.set_stock(2, 50.0);

    let order = h
        .workflow
        .create_order(TestHarness::request(&[(1, 5.0), (2, 3.0)]))
        .await
        .unwrap();
    let prices: Vec<f64> = order.items.iter().map(|l| l.unit_price).collect();
    assert_eq!(prices, vec![10.0, 20.0]);
    assert_eq!(order.status, OrderStatus::Pending);

    h.workflow.process_order(order.id).await.unwrap();

    assert_eq!(h.status(order.id).await, OrderStatus::Failed);
    assert!(!h.inventory.checks().contains(&ProductId::new(2)));
    assert!(h.inventory.adjustments().is_empty());
}
