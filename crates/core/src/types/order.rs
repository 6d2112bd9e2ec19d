//! Orders and their line items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MemberId, OrderId, OrderStatus};
use crate::BatchId;

/// A single product line of an order.
///
/// Line items only exist as part of an order and never change after the order
/// is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product name, trimmed and non-empty.
    pub product_name: String,
    /// Price per unit in whole currency units, never negative.
    pub unit_price: i64,
    /// Units ordered, at least one.
    pub quantity: i64,
}

impl LineItem {
    /// `unit_price × quantity`, or `None` on overflow.
    #[must_use]
    pub const fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Sum of all line totals, or `None` if any step overflows.
#[must_use]
pub fn order_total(items: &[LineItem]) -> Option<i64> {
    items
        .iter()
        .try_fold(0_i64, |acc, item| acc.checked_add(item.line_total()?))
}

/// A fully validated order ready to be persisted.
///
/// The total is deliberately absent: stores derive it from `items` so a
/// client-supplied figure can never reach the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub member_id: MemberId,
    /// Profile name at submission time.
    pub customer_name: String,
    /// Profile phone at submission time.
    pub phone: String,
    pub delivery_location: String,
    pub note: String,
    /// Non-empty, in submission order.
    pub items: Vec<LineItem>,
    /// Client-chosen token identifying this logical submission.
    pub idempotency_key: String,
    pub batch_id: BatchId,
}

impl NewOrder {
    /// Server-side total for this order.
    #[must_use]
    pub fn total(&self) -> Option<i64> {
        order_total(&self.items)
    }
}

/// A persisted order with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(skip_serializing)]
    pub member_id: MemberId,
    pub created_at: DateTime<Utc>,
    pub customer_name: String,
    pub phone: String,
    pub delivery_location: String,
    pub note: String,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub admin_note: Option<String>,
    pub batch_id: String,
    pub order_items: Vec<LineItem>,
}
