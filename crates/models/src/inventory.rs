use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inventory is a product master record together with its stock level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: uuid::Uuid,
    pub warehouse_id: uuid::Uuid,
    pub sku: String,
    pub product_name: String,
    pub location: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Inventory {
    /// Quantity which is on hand and not reserved by open pick lists.
    pub fn available(&self) -> i32 {
        (self.quantity - self.reserved_quantity).max(0)
    }
}
