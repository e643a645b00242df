//! Orders and their lines.
//!
//! This module owns the order tables only. Product lookups, stock checks
//! and notifications belong to the fulfillment workflow, which drives the
//! [`OrderService`] primitives below.

use serde::{Deserialize, Serialize};
use store::{
    NewOrder, NewOrderLine, OrderId, OrderLineRecord, OrderRecord, OrderStatus, OrderStore,
    Pagination, ProductId,
};

use crate::error::{DomainError, Result};
use crate::validation::{self, CustomerName, Email, Quantity, ValidationError};

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: f64,
}

/// Request body for creating an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<OrderLineRequest>,
}

/// A line that passed validation but has no price yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl RequestedLine {
    /// Attaches the price snapshot taken at creation time.
    pub fn priced(self, unit_price: f64) -> NewOrderLine {
        NewOrderLine {
            product_id: self.product_id,
            quantity: self.quantity.value(),
            unit_price,
        }
    }
}

/// A validated order request.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub customer: NewOrder,
    pub lines: Vec<RequestedLine>,
}

impl CreateOrder {
    pub fn validate(self) -> std::result::Result<ValidatedOrder, ValidationError> {
        let customer_name = CustomerName::parse(self.customer_name)?;
        let customer_email = Email::parse(self.customer_email)?;
        if self.items.is_empty() {
            return Err(ValidationError::new("items", "must contain at least one item"));
        }
        let lines = self
            .items
            .into_iter()
            .map(|item| {
                Ok(RequestedLine {
                    product_id: validation::product_ref(item.product_id)?,
                    quantity: Quantity::parse(item.quantity)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, ValidationError>>()?;

        Ok(ValidatedOrder {
            customer: NewOrder {
                customer_name: customer_name.into_inner(),
                customer_email: customer_email.into_inner(),
            },
            lines,
        })
    }
}

/// Request body for a status overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
}

/// Service for reading and writing order rows.
pub struct OrderService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: OrderId) -> Result<OrderRecord> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", id))
    }

    pub async fn list(&self, page: Pagination) -> Result<Vec<OrderRecord>> {
        Ok(self.store.list_orders(page).await?)
    }

    pub async fn list_by_email(&self, email: &str) -> Result<Vec<OrderRecord>> {
        Ok(self.store.list_orders_by_email(email).await?)
    }

    /// Inserts the order row in `pending`, with no lines yet.
    #[tracing::instrument(skip(self, customer), fields(customer_email = %customer.customer_email))]
    pub async fn open(&self, customer: NewOrder) -> Result<OrderRecord> {
        let order = self.store.insert_order(customer).await?;
        tracing::debug!(order_id = %order.id, "Order opened");
        Ok(order)
    }

    pub async fn add_lines(
        &self,
        id: OrderId,
        lines: Vec<NewOrderLine>,
    ) -> Result<Vec<OrderLineRecord>> {
        Ok(self.store.insert_order_lines(id, lines).await?)
    }

    /// Removes an order and its lines. Deleting a missing order is not an
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn discard(&self, id: OrderId) -> Result<()> {
        if !self.store.delete_order(id).await? {
            tracing::warn!(order_id = %id, "Order to discard was already gone");
        }
        Ok(())
    }

    /// Overwrites the status regardless of the current one.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<OrderRecord> {
        self.store
            .set_order_status(id, status)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", id))
    }

    /// Moves the order from `from` to `to` if it is still in `from`.
    pub async fn transition(&self, id: OrderId, from: OrderStatus, to: OrderStatus) -> Result<bool> {
        Ok(self.store.transition_order_status(id, from, to).await?)
    }
}
