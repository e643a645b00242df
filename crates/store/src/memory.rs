use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    AdjustOutcome, InventoryChanges, InventoryItemId, InventoryRecord, InventoryStore,
    NewInventoryItem, NewNotification, NewOrder, NewOrderLine, NewProduct, NotificationId,
    NotificationRecord, NotificationStatus, NotificationStore, OrderId, OrderLineId,
    OrderLineRecord, OrderRecord, OrderStatus, OrderStore, Pagination, ProductChanges, ProductId,
    ProductRecord, ProductStore, Result, StoreError,
};

#[derive(Debug, Default)]
struct Sequence(i64);

impl Sequence {
    fn next(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, ProductRecord>,
    inventory: BTreeMap<InventoryItemId, InventoryRecord>,
    orders: BTreeMap<OrderId, OrderRecord>,
    notifications: BTreeMap<NotificationId, NotificationRecord>,
    product_seq: Sequence,
    inventory_seq: Sequence,
    order_seq: Sequence,
    line_seq: Sequence,
    notification_seq: Sequence,
}

impl Tables {
    fn inventory_for(&mut self, product_id: ProductId) -> Option<&mut InventoryRecord> {
        self.inventory
            .values_mut()
            .find(|item| item.product_id == product_id)
    }
}

/// In-memory store implementation for testing and local runs.
///
/// Implements every storage trait over a single shared set of tables, with
/// the same id sequencing and ordering guarantees as the PostgreSQL store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of stored notifications.
    pub async fn notification_count(&self) -> usize {
        self.tables.read().await.notifications.len()
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord> {
        let mut tables = self.tables.write().await;
        if tables.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::Conflict(format!(
                "product with SKU {} already exists",
                product.sku
            )));
        }

        let id = ProductId::new(tables.product_seq.next());
        let record = ProductRecord {
            id,
            name: product.name,
            description: product.description,
            price: product.price,
            sku: product.sku,
            created_at: Utc::now(),
            updated_at: None,
        };
        tables.products.insert(id, record.clone());
        Ok(record)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<ProductRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn list_products(&self, page: Pagination) -> Result<Vec<ProductRecord>> {
        let tables = self.tables.read().await;
        Ok(page.apply(tables.products.values().cloned()))
    }

    async fn update_product(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Option<ProductRecord>> {
        let mut tables = self.tables.write().await;

        if let Some(ref sku) = changes.sku
            && tables.products.values().any(|p| &p.sku == sku && p.id != id)
        {
            return Err(StoreError::Conflict(format!(
                "product with SKU {sku} already exists"
            )));
        }

        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(product);
        product.updated_at = Some(Utc::now());
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        Ok(self.tables.write().await.products.remove(&id).is_some())
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn upsert_inventory(&self, item: NewInventoryItem) -> Result<InventoryRecord> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some(existing) = tables.inventory_for(item.product_id) {
            existing.quantity = item.quantity;
            existing.location = item.location;
            existing.last_updated = now;
            return Ok(existing.clone());
        }

        let id = InventoryItemId::new(tables.inventory_seq.next());
        let record = InventoryRecord {
            id,
            product_id: item.product_id,
            quantity: item.quantity,
            location: item.location,
            last_updated: now,
            created_at: now,
        };
        tables.inventory.insert(id, record.clone());
        Ok(record)
    }

    async fn get_inventory(&self, product_id: ProductId) -> Result<Option<InventoryRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .inventory
            .values()
            .find(|item| item.product_id == product_id)
            .cloned())
    }

    async fn list_inventory(&self, page: Pagination) -> Result<Vec<InventoryRecord>> {
        let tables = self.tables.read().await;
        Ok(page.apply(tables.inventory.values().cloned()))
    }

    async fn update_inventory(
        &self,
        product_id: ProductId,
        changes: InventoryChanges,
    ) -> Result<Option<InventoryRecord>> {
        let mut tables = self.tables.write().await;
        let Some(item) = tables.inventory_for(product_id) else {
            return Ok(None);
        };
        if let Some(quantity) = changes.quantity {
            item.quantity = quantity;
        }
        if let Some(location) = changes.location {
            item.location = Some(location);
        }
        item.last_updated = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn adjust_inventory(
        &self,
        product_id: ProductId,
        amount: f64,
        allow_negative: bool,
    ) -> Result<AdjustOutcome> {
        let mut tables = self.tables.write().await;
        let Some(item) = tables.inventory_for(product_id) else {
            return Ok(AdjustOutcome::Missing);
        };

        let new_quantity = item.quantity + amount;
        if new_quantity < 0.0 && !allow_negative {
            return Ok(AdjustOutcome::WouldGoNegative {
                current: item.quantity,
            });
        }

        item.quantity = new_quantity;
        item.last_updated = Utc::now();
        Ok(AdjustOutcome::Applied(item.clone()))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<OrderRecord> {
        let mut tables = self.tables.write().await;
        let id = OrderId::new(tables.order_seq.next());
        let record = OrderRecord {
            id,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
            items: Vec::new(),
        };
        tables.orders.insert(id, record.clone());
        Ok(record)
    }

    async fn insert_order_lines(
        &self,
        order_id: OrderId,
        lines: Vec<NewOrderLine>,
    ) -> Result<Vec<OrderLineRecord>> {
        let mut tables = self.tables.write().await;
        if !tables.orders.contains_key(&order_id) {
            // Mirrors the foreign key violation the relational backend raises.
            return Err(StoreError::Conflict(format!(
                "order {order_id} does not exist"
            )));
        }

        let records: Vec<OrderLineRecord> = lines
            .into_iter()
            .map(|line| OrderLineRecord {
                id: OrderLineId::new(tables.line_seq.next()),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        if let Some(order) = tables.orders.get_mut(&order_id) {
            order.items.extend(records.iter().cloned());
        }
        Ok(records)
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.tables.write().await.orders.remove(&order_id).is_some())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn list_orders(&self, page: Pagination) -> Result<Vec<OrderRecord>> {
        let tables = self.tables.read().await;
        Ok(page.apply(tables.orders.values().cloned()))
    }

    async fn list_orders_by_email(&self, email: &str) -> Result<Vec<OrderRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|order| order.customer_email == email)
            .cloned()
            .collect())
    }

    async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<OrderRecord>> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(&order_id) else {
            return Ok(None);
        };
        order.status = status;
        order.updated_at = Some(Utc::now());
        Ok(Some(order.clone()))
    }

    async fn transition_order_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&order_id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationRecord> {
        let mut tables = self.tables.write().await;
        let id = NotificationId::new(tables.notification_seq.next());
        let record = NotificationRecord {
            id,
            kind: notification.kind,
            data: notification.data,
            status: NotificationStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            sent_at: None,
        };
        tables.notifications.insert(id, record.clone());
        Ok(record)
    }

    async fn get_notification(&self, id: NotificationId) -> Result<Option<NotificationRecord>> {
        Ok(self.tables.read().await.notifications.get(&id).cloned())
    }

    async fn list_notifications(
        &self,
        page: Pagination,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<NotificationRecord>> {
        let tables = self.tables.read().await;
        Ok(page.apply(
            tables
                .notifications
                .values()
                .filter(|n| status.is_none_or(|s| n.status == s))
                .cloned(),
        ))
    }

    async fn mark_notification_sent(
        &self,
        id: NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<NotificationRecord>> {
        let mut tables = self.tables.write().await;
        let Some(notification) = tables.notifications.get_mut(&id) else {
            return Ok(None);
        };
        notification.status = NotificationStatus::Sent;
        notification.sent_at = Some(sent_at);
        notification.error_message = None;
        Ok(Some(notification.clone()))
    }

    async fn mark_notification_failed(
        &self,
        id: NotificationId,
        error: String,
    ) -> Result<Option<NotificationRecord>> {
        let mut tables = self.tables.write().await;
        let Some(notification) = tables.notifications.get_mut(&id) else {
            return Ok(None);
        };
        notification.status = NotificationStatus::Failed;
        notification.error_message = Some(error);
        Ok(Some(notification.clone()))
    }

    async fn reset_notification(&self, id: NotificationId) -> Result<Option<NotificationRecord>> {
        let mut tables = self.tables.write().await;
        let Some(notification) = tables.notifications.get_mut(&id) else {
            return Ok(None);
        };
        notification.status = NotificationStatus::Pending;
        notification.error_message = None;
        notification.sent_at = None;
        Ok(Some(notification.clone()))
    }
}
