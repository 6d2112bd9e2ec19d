//! Submission input normalization.
//!
//! Text fields lose any NUL characters (`PostgreSQL` `TEXT` cannot store
//! them), are trimmed, and are then cut to their maximum length rather than
//! rejected for being long. Items without a product name are dropped; any
//! remaining item with an unusable price or quantity fails the whole request
//! before anything is written.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use group_order_core::{LineItem, order_total};

use super::OrderError;

pub const MAX_DELIVERY_LOCATION_CHARS: usize = 50;
pub const MAX_NOTE_CHARS: usize = 200;
pub const MAX_DEVICE_ID_CHARS: usize = 80;
pub const MAX_IDEMPOTENCY_KEY_CHARS: usize = 80;
pub const MAX_PRODUCT_NAME_CHARS: usize = 100;

/// Largest integer a client can send without losing precision as a JSON double.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// One cart line as submitted.
///
/// Prices and quantities are kept as raw JSON so numeric strings can be
/// accepted and everything else reported as an invalid item. A product name
/// that is not a string reads as blank, which drops the item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemInput {
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_name: String,
    #[serde(default)]
    pub unit_price: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

/// Fields of a submission after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderInput {
    pub delivery_location: String,
    pub note: String,
    pub device_id: String,
    pub idempotency_key: String,
    pub items: Vec<LineItem>,
}

/// Deserialize any JSON value as text; non-strings read as blank.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// Deserialize a JSON array of items; anything else reads as no items.
///
/// Elements that are not objects become blank items and are dropped later.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<ItemInput>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .map(|value| serde_json::from_value(value).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    })
}

/// Drop NUL characters, trim, then keep at most `max_chars` characters.
#[must_use]
pub fn sanitize_text(value: &str, max_chars: usize) -> String {
    let stripped: String = value.chars().filter(|&c| c != '\0').collect();
    stripped.trim().chars().take(max_chars).collect()
}

impl OrderInput {
    /// Validate and normalize raw submission fields.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if a required field is blank or `items` is empty
    /// - `InvalidItem` if a named item has a bad price or quantity
    /// - `EmptyOrder` if no item has a product name
    pub fn normalize(
        delivery_location: &str,
        note: &str,
        device_id: &str,
        idempotency_key: &str,
        items: &[ItemInput],
    ) -> Result<Self, OrderError> {
        let delivery_location = sanitize_text(delivery_location, MAX_DELIVERY_LOCATION_CHARS);
        let note = sanitize_text(note, MAX_NOTE_CHARS);
        let device_id = sanitize_text(device_id, MAX_DEVICE_ID_CHARS);
        let idempotency_key = sanitize_text(idempotency_key, MAX_IDEMPOTENCY_KEY_CHARS);

        if delivery_location.is_empty() || device_id.is_empty() || idempotency_key.is_empty() {
            return Err(OrderError::InvalidInput("Missing required fields".to_owned()));
        }
        if items.is_empty() {
            return Err(OrderError::InvalidInput("Items required".to_owned()));
        }

        let items = normalize_items(items)?;
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if order_total(&items).is_none() {
            return Err(OrderError::InvalidItem("Order total out of range".to_owned()));
        }

        Ok(Self {
            delivery_location,
            note,
            device_id,
            idempotency_key,
            items,
        })
    }
}

fn normalize_items(items: &[ItemInput]) -> Result<Vec<LineItem>, OrderError> {
    let mut cleaned = Vec::with_capacity(items.len());

    for item in items {
        let product_name = sanitize_text(&item.product_name, MAX_PRODUCT_NAME_CHARS);
        if product_name.is_empty() {
            continue;
        }

        let unit_price = numeric(item.unit_price.as_ref())
            .filter(|price| *price >= 0.0)
            .and_then(floor_to_integer)
            .ok_or_else(|| OrderError::InvalidItem("Invalid unit_price".to_owned()))?;

        let quantity = numeric(item.quantity.as_ref())
            .filter(|quantity| *quantity > 0.0)
            .and_then(floor_to_integer)
            .filter(|quantity| *quantity >= 1)
            .ok_or_else(|| OrderError::InvalidItem("Invalid quantity".to_owned()))?;

        cleaned.push(LineItem {
            product_name,
            unit_price,
            quantity,
        });
    }

    Ok(cleaned)
}

/// A finite number from a JSON number or numeric string.
fn numeric(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

#[allow(clippy::cast_possible_truncation)] // bounded by MAX_EXACT_INTEGER
fn floor_to_integer(value: f64) -> Option<i64> {
    let floored = value.floor();
    (floored.abs() <= MAX_EXACT_INTEGER).then_some(floored as i64)
}
