//! Domain types shared by every layer of the storefront backend.
//!
//! Entities mirror the persisted rows (`orders`, `order_items`, `products`,
//! `users`); the [`api`] module holds the typed HTTP request and response bodies.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod api;

/// Lifecycle of an order: `NEW → NEGOTIATING → SHIPPING → COMPLETED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Negotiating,
    Shipping,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::New,
        OrderStatus::Negotiating,
        OrderStatus::Shipping,
        OrderStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Negotiating => "NEGOTIATING",
            OrderStatus::Shipping => "SHIPPING",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    /// The status that conventionally follows this one, if any.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::New => Some(OrderStatus::Negotiating),
            OrderStatus::Negotiating => Some(OrderStatus::Shipping),
            OrderStatus::Shipping => Some(OrderStatus::Completed),
            OrderStatus::Completed => None,
        }
    }

    /// Whether moving to `to` follows the conventional forward flow.
    ///
    /// Staying in the same status counts as conventional. Anything else is
    /// still allowed for administrators but worth flagging.
    pub fn is_conventional_transition(&self, to: OrderStatus) -> bool {
        *self == to || self.next() == Some(to)
    }

    /// `NEGOTIATING` and `SHIPPING` orders are being worked on.
    pub fn is_processing(&self) -> bool {
        matches!(self, OrderStatus::Negotiating | OrderStatus::Shipping)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored or submitted status is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown order status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Frozen snapshot of one purchased product at order time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    #[serde(skip)]
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i32,
    pub image: String,
}

/// A customer purchase together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    /// Owning account; the guest account for unauthenticated orders.
    #[serde(skip)]
    pub user_id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// `Σ price × quantity` over the line items.
    pub fn items_total(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum()
    }

    /// Case-insensitive comparison against the stored phone.
    pub fn phone_matches(&self, phone: &str) -> bool {
        self.phone.to_lowercase() == phone.to_lowercase()
    }
}

/// Catalog entry. Read by the order workflow, never written by it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Tracked stock; `0` means the product does not track stock.
    pub stock_count: i32,
    pub in_stock: bool,
    pub images: Vec<String>,
}

impl Product {
    /// First image reference, or an empty string when the product has none.
    pub fn primary_image(&self) -> &str {
        self.images.first().map(String::as_str).unwrap_or("")
    }
}

/// An account. Only `is_admin` matters to the order workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

/// Order row about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub notes: Option<String>,
    pub total: Decimal,
}

/// Enriched line item about to be inserted alongside its order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub image: String,
}

/// Partial update of an order. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderChanges {
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub status: Option<OrderStatus>,
}

impl OrderChanges {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.notes.is_none()
            && self.status.is_none()
    }

    /// Applies the present fields to `order` in place.
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(name) = &self.customer_name {
            order.customer_name = name.clone();
        }
        if let Some(phone) = &self.phone {
            order.phone = phone.clone();
        }
        if let Some(address) = &self.address {
            order.address = address.clone();
        }
        if let Some(notes) = &self.notes {
            order.notes = Some(notes.clone());
        }
        if let Some(status) = self.status {
            order.status = status;
        }
    }
}

/// Order counters for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: i64,
    pub new_orders: i64,
    pub processing_orders: i64,
    pub completed_orders: i64,
    /// Sum of completed order totals, rounded to cents.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
}
