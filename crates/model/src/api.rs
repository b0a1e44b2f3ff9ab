//! Typed HTTP bodies for the `/api/orders` routes.
//!
//! Request types reject unknown fields; `validate` checks the shape rules the
//! deserializer cannot express before any store access happens.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{NewOrder, Order, OrderChanges, OrderStatus};

/// Largest amount a `NUMERIC(12,2)` money column holds: 9 999 999 999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Money is stored with cent precision; anything finer would be rounded by
/// the database after the integrity checks ran.
fn check_amount(field: &str, amount: Decimal) -> Result<(), String> {
    if amount.is_sign_negative() {
        return Err(format!("{field} must not be negative"));
    }
    if amount > MAX_AMOUNT {
        return Err(format!("{field} must not exceed {MAX_AMOUNT}"));
    }
    if amount.normalize().scale() > 2 {
        return Err(format!("{field} must have at most two decimal places"));
    }
    Ok(())
}

/// One requested line: product, quantity and the unit price the client saw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl OrderItemRequest {
    /// `price × quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Delivery contact supplied with a new order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomerInfo {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub notes: Option<String>,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub customer_info: CustomerInfo,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

impl CreateOrderRequest {
    /// Checks required fields and numeric bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("order has no items".into());
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.quantity < 1 {
                return Err(format!("items[{idx}].quantity must be at least 1"));
            }
            check_amount(&format!("items[{idx}].price"), item.price)?;
        }
        check_amount("total", self.total)?;
        let info = &self.customer_info;
        if info.full_name.trim().is_empty() {
            return Err("customerInfo.fullName is required".into());
        }
        if info.phone.trim().is_empty() {
            return Err("customerInfo.phone is required".into());
        }
        if info.address.trim().is_empty() {
            return Err("customerInfo.address is required".into());
        }
        Ok(())
    }

    /// `Σ price × quantity` of the submitted lines, or `None` on overflow.
    pub fn computed_total(&self) -> Option<Decimal> {
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total()?))
    }

    /// Order row for this request; the declared total is what gets stored.
    pub fn to_new_order(&self) -> NewOrder {
        NewOrder {
            customer_name: self.customer_info.full_name.clone(),
            phone: self.customer_info.phone.clone(),
            address: self.customer_info.address.clone(),
            notes: self.customer_info.notes.clone(),
            total: self.total,
        }
    }
}

/// Body of `PUT /api/orders/{id}` and `PUT /api/orders/{id}/admin`.
///
/// Omitted fields stay untouched; a field sent as `""` is stored as `""`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateOrderRequest {
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub status: Option<OrderStatus>,
}

impl From<UpdateOrderRequest> for OrderChanges {
    fn from(req: UpdateOrderRequest) -> Self {
        OrderChanges {
            customer_name: req.customer_name,
            phone: req.phone,
            address: req.address,
            notes: req.notes,
            status: req.status,
        }
    }
}

/// Body of `PUT /api/orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// `?phone=` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhoneQuery {
    pub phone: Option<String>,
}

/// Response of order creation and order-info updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEnvelope {
    pub success: bool,
    pub order: Order,
    pub message: String,
}

impl OrderEnvelope {
    pub fn new(order: Order, message: impl Into<String>) -> Self {
        Self {
            success: true,
            order,
            message: message.into(),
        }
    }
}

/// Response of `GET /api/orders?phone=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersByPhoneResponse {
    pub success: bool,
    pub orders: Vec<Order>,
    pub total: usize,
    pub message: String,
}

impl From<Vec<Order>> for OrdersByPhoneResponse {
    fn from(orders: Vec<Order>) -> Self {
        let message = if orders.is_empty() {
            "No orders found for this phone number".to_string()
        } else {
            format!("Found {} order(s) for phone number", orders.len())
        };
        Self {
            success: true,
            total: orders.len(),
            orders,
            message,
        }
    }
}
