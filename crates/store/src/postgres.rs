use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    AdjustOutcome, InventoryChanges, InventoryItemId, InventoryRecord, InventoryStore,
    NewInventoryItem, NewNotification, NewOrder, NewOrderLine, NewProduct, NotificationId,
    NotificationRecord, NotificationStatus, NotificationStore, OrderId, OrderLineId,
    OrderLineRecord, OrderRecord, OrderStatus, OrderStore, Pagination, ProductChanges, ProductId,
    ProductRecord, ProductStore, Result, StoreError,
};

const PRODUCT_COLUMNS: &str = "id, name, description, price, sku, created_at, updated_at";
const INVENTORY_COLUMNS: &str = "id, product_id, quantity, location, last_updated, created_at";
const ORDER_COLUMNS: &str = "id, customer_name, customer_email, status, created_at, updated_at";
const LINE_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price";
const NOTIFICATION_COLUMNS: &str =
    "id, type, data, status, error_message, created_at, sent_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url` and wraps it.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            sku: row.try_get("sku")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_inventory(row: PgRow) -> Result<InventoryRecord> {
        Ok(InventoryRecord {
            id: InventoryItemId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get("quantity")?,
            location: row.try_get("location")?,
            last_updated: row.try_get("last_updated")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<OrderRecord> {
        let status: String = row.try_get("status")?;
        Ok(OrderRecord {
            id: OrderId::new(row.try_get("id")?),
            customer_name: row.try_get("customer_name")?,
            customer_email: row.try_get("customer_email")?,
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            items: Vec::new(),
        })
    }

    fn row_to_line(row: PgRow) -> Result<OrderLineRecord> {
        Ok(OrderLineRecord {
            id: OrderLineId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
        })
    }

    fn row_to_notification(row: PgRow) -> Result<NotificationRecord> {
        let status: String = row.try_get("status")?;
        Ok(NotificationRecord {
            id: NotificationId::new(row.try_get("id")?),
            kind: row.try_get("type")?,
            data: row.try_get("data")?,
            status: status
                .parse::<NotificationStatus>()
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            sent_at: row.try_get("sent_at")?,
        })
    }

    /// Loads the lines of every given order and attaches them in line order.
    async fn attach_lines(&self, mut orders: Vec<OrderRecord>) -> Result<Vec<OrderRecord>> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id ASC"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderLineRecord>> = HashMap::new();
        for row in rows {
            let line = Self::row_to_line(row)?;
            by_order.entry(line.order_id).or_default().push(line);
        }
        for order in &mut orders {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }
}

/// Maps a unique-constraint violation to `Conflict`, leaving other errors as
/// database errors.
fn conflict_on_unique(e: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(message());
    }
    StoreError::Database(e)
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (name, description, price, sku)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.sku)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("product with SKU {} already exists", product.sku)
            })
        })?;

        Self::row_to_product(row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_product)
            .transpose()
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<ProductRecord>> {
        sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1"))
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_product)
            .transpose()
    }

    async fn list_products(&self, page: Pagination) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id ASC OFFSET $1 LIMIT $2"
        ))
        .bind(i64::from(page.skip))
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn update_product(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Option<ProductRecord>> {
        let sku = changes.sku.clone();
        sqlx::query(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                sku = COALESCE($5, sku),
                updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.price)
        .bind(changes.sku)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!(
                    "product with SKU {} already exists",
                    sku.unwrap_or_default()
                )
            })
        })?
        .map(Self::row_to_product)
        .transpose()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn upsert_inventory(&self, item: NewInventoryItem) -> Result<InventoryRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO inventory_items (product_id, quantity, location)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                location = EXCLUDED.location,
                last_updated = now()
            RETURNING {INVENTORY_COLUMNS}
            "#
        ))
        .bind(item.product_id.as_i64())
        .bind(item.quantity)
        .bind(&item.location)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_inventory(row)
    }

    async fn get_inventory(&self, product_id: ProductId) -> Result<Option<InventoryRecord>> {
        sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items WHERE product_id = $1"
        ))
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_inventory)
        .transpose()
    }

    async fn list_inventory(&self, page: Pagination) -> Result<Vec<InventoryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items ORDER BY id ASC OFFSET $1 LIMIT $2"
        ))
        .bind(i64::from(page.skip))
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_inventory).collect()
    }

    async fn update_inventory(
        &self,
        product_id: ProductId,
        changes: InventoryChanges,
    ) -> Result<Option<InventoryRecord>> {
        sqlx::query(&format!(
            r#"
            UPDATE inventory_items SET
                quantity = COALESCE($2, quantity),
                location = COALESCE($3, location),
                last_updated = now()
            WHERE product_id = $1
            RETURNING {INVENTORY_COLUMNS}
            "#
        ))
        .bind(product_id.as_i64())
        .bind(changes.quantity)
        .bind(changes.location)
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_inventory)
        .transpose()
    }

    async fn adjust_inventory(
        &self,
        product_id: ProductId,
        amount: f64,
        allow_negative: bool,
    ) -> Result<AdjustOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<f64> = sqlx::query_scalar(
            "SELECT quantity FROM inventory_items WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Ok(AdjustOutcome::Missing);
        };
        if current + amount < 0.0 && !allow_negative {
            return Ok(AdjustOutcome::WouldGoNegative { current });
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE inventory_items SET quantity = quantity + $2, last_updated = now()
            WHERE product_id = $1
            RETURNING {INVENTORY_COLUMNS}
            "#
        ))
        .bind(product_id.as_i64())
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AdjustOutcome::Applied(Self::row_to_inventory(row)?))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: NewOrder) -> Result<OrderRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (customer_name, customer_email, status)
            VALUES ($1, $2, $3)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_order(row)
    }

    async fn insert_order_lines(
        &self,
        order_id: OrderId,
        lines: Vec<NewOrderLine>,
    ) -> Result<Vec<OrderLineRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut records = Vec::with_capacity(lines.len());

        for line in lines {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                RETURNING {LINE_COLUMNS}
                "#
            ))
            .bind(order_id.as_i64())
            .bind(line.product_id.as_i64())
            .bind(line.quantity)
            .bind(line.unit_price)
            .fetch_one(&mut *tx)
            .await?;
            records.push(Self::row_to_line(row)?);
        }

        tx.commit().await?;
        Ok(records)
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Self::row_to_order(row)?;
        Ok(self.attach_lines(vec![order]).await?.pop())
    }

    async fn list_orders(&self, page: Pagination) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY id ASC OFFSET $1 LIMIT $2"
        ))
        .bind(i64::from(page.skip))
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        let orders = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.attach_lines(orders).await
    }

    async fn list_orders_by_email(&self, email: &str) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_email = $1 ORDER BY id ASC"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        let orders = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.attach_lines(orders).await
    }

    async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id.as_i64())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Self::row_to_order(row)?;
        Ok(self.attach_lines(vec![order]).await?.pop())
    }

    async fn transition_order_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = now() WHERE id = $1 AND status = $2",
        )
        .bind(order_id.as_i64())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO notifications (type, data, status)
            VALUES ($1, $2, $3)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(&notification.kind)
        .bind(&notification.data)
        .bind(NotificationStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_notification(row)
    }

    async fn get_notification(&self, id: NotificationId) -> Result<Option<NotificationRecord>> {
        sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_notification)
        .transpose()
    }

    async fn list_notifications(
        &self,
        page: Pagination,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<NotificationRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY id ASC OFFSET $2 LIMIT $3
            "#
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(i64::from(page.skip))
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_notification).collect()
    }

    async fn mark_notification_sent(
        &self,
        id: NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<NotificationRecord>> {
        sqlx::query(&format!(
            r#"
            UPDATE notifications SET status = $2, sent_at = $3, error_message = NULL
            WHERE id = $1
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(NotificationStatus::Sent.as_str())
        .bind(sent_at)
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_notification)
        .transpose()
    }

    async fn mark_notification_failed(
        &self,
        id: NotificationId,
        error: String,
    ) -> Result<Option<NotificationRecord>> {
        sqlx::query(&format!(
            r#"
            UPDATE notifications SET status = $2, error_message = $3
            WHERE id = $1
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(NotificationStatus::Failed.as_str())
        .bind(error)
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_notification)
        .transpose()
    }

    async fn reset_notification(&self, id: NotificationId) -> Result<Option<NotificationRecord>> {
        sqlx::query(&format!(
            r#"
            UPDATE notifications SET status = $2, error_message = NULL, sent_at = NULL
            WHERE id = $1
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(NotificationStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_notification)
        .transpose()
    }
}
