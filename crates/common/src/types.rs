use serde::{Deserialize, Serialize};

/// Declares a row identifier backed by the table's `BIGSERIAL` key.
///
/// Each identifier is its own type so a product id can never be passed
/// where an order id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database key.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw database key.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a product in the catalog.
    ProductId
);
row_id!(
    /// Identifier of an inventory row (distinct from the product it tracks).
    InventoryItemId
);
row_id!(
    /// Identifier of a customer order.
    OrderId
);
row_id!(
    /// Identifier of a single line on an order.
    OrderLineId
);
row_id!(
    /// Identifier of a stored notification.
    NotificationId
);

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Offset pagination for list endpoints (`?skip=0&limit=100`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Pagination {
    pub fn new(skip: u32, limit: u32) -> Self {
        Self { skip, limit }
    }

    /// Applies the page window to an already ordered iterator.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_transparent_in_json() {
        let id = OrderId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let parsed: ProductId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed.as_i64(), 7);
    }

    #[test]
    fn pagination_defaults_when_fields_are_missing() {
        let page: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(page, Pagination::default());
        assert_eq!(page.limit, 100);

        let page: Pagination = serde_json::from_str(r#"{"skip": 5}"#).unwrap();
        assert_eq!(page.skip, 5);
        assert_eq!(page.limit, 100);
    }

    #[test]
    fn pagination_applies_skip_then_limit() {
        let page = Pagination::new(2, 3);
        assert_eq!(page.apply(1..=10), vec![3, 4, 5]);
        assert!(Pagination::new(20, 5).apply(1..=10).is_empty());
    }
}
