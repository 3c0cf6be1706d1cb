use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOptionValue {
    pub value: String,
    /// Added to the base price when this value is selected, in JPY.
    pub price_modifier: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOption {
    pub option_id: String,
    pub name: String,
    pub values: Vec<ProductOptionValue>,
}

/// Catalog entity. Read-only from the order workflow's perspective: prices
/// are snapshotted into the order at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    /// Base price in JPY before option modifiers.
    pub base_price: i64,
    pub options: Vec<ProductOption>,
    /// `None` means made-to-order (no stock tracking).
    pub stock_quantity: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price modifier for a selected option value, looked up by option id
    /// then value. Unknown selections contribute nothing.
    pub fn option_modifier(&self, option_id: &str, value: &str) -> i64 {
        self.options
            .iter()
            .find(|option| option.option_id == option_id)
            .and_then(|option| option.values.iter().find(|v| v.value == value))
            .map(|v| v.price_modifier)
            .unwrap_or(0)
    }
}
