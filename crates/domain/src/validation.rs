//! Value objects that validate request input.
//!
//! Each type can only be built through its `parse` constructor, so holding
//! one is proof the value passed the field's rules.

use serde::Serialize;
use thiserror::Error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

type Validated<T> = Result<T, ValidationError>;

fn check_length(field: &'static str, value: &str, min: usize, max: usize) -> Validated<()> {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::new(
            field,
            format!("must be at least {min} characters"),
        ));
    }
    if len > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Validated<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::new(field, "must be greater than 0"))
    }
}

/// A customer's display name, 1 to 100 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerName(String);

impl CustomerName {
    pub fn parse(value: impl Into<String>) -> Validated<Self> {
        let value = value.into();
        check_length("customer_name", &value, 1, 100)?;
        Ok(Self(value))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// An email address.
///
/// Accepts `local@domain.tld`: exactly one `@`, no whitespace, a non-empty
/// local part and a dotted domain with no empty labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email(String);

impl Email {
    pub fn parse(value: impl Into<String>) -> Validated<Self> {
        let value = value.into();
        let invalid = || ValidationError::new("customer_email", "value is not a valid email address");

        if value.len() > 254 || value.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.contains('@') {
            return Err(invalid());
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
            return Err(invalid());
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A stock keeping unit: 3 to 50 ASCII letters, digits or hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sku(String);

impl Sku {
    pub fn parse(value: impl Into<String>) -> Validated<Self> {
        let value = value.into();
        check_length("sku", &value, 3, 50)?;
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ValidationError::new(
                "sku",
                "may only contain letters, digits and hyphens",
            ));
        }
        Ok(Self(value))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A product name, 1 to 100 characters.
pub fn product_name(value: String) -> Validated<String> {
    check_length("name", &value, 1, 100)?;
    Ok(value)
}

/// A product description, at most 1000 characters.
pub fn description(value: String) -> Validated<String> {
    check_length("description", &value, 0, 1000)?;
    Ok(value)
}

/// A storage location label, at most 100 characters.
pub fn location(value: String) -> Validated<String> {
    check_length("location", &value, 0, 100)?;
    Ok(value)
}

/// A unit price. Must be finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Price(f64);

impl Price {
    pub fn parse(value: f64) -> Validated<Self> {
        check_positive("price", value).map(Self)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// A quantity requested on an order line. Must be strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Quantity(f64);

impl Quantity {
    pub fn parse(value: f64) -> Validated<Self> {
        check_positive("quantity", value).map(Self)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// An on-hand stock level as set by create or update. Zero is allowed;
/// only signed adjustments may go negative.
pub fn stock_level(value: f64) -> Validated<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::new(
            "quantity",
            "must be greater than or equal to 0",
        ))
    }
}

/// A product reference in a request body. Database keys start at 1.
pub fn product_ref(value: common::ProductId) -> Validated<common::ProductId> {
    if value.as_i64() > 0 {
        Ok(value)
    } else {
        Err(ValidationError::new("product_id", "must be greater than 0"))
    }
}
