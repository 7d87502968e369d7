use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known values of `PickList::status`.
pub mod pick_list_status {
    pub const PENDING: &str = "pending";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const COMPLETED: &str = "completed";
}

/// PickList is a unit of picking work within a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickList {
    pub id: uuid::Uuid,
    pub list_number: String,
    pub warehouse_id: uuid::Uuid,
    pub assigned_picker_id: Option<uuid::Uuid>,
    pub status: String,
    pub priority: String,
    pub total_items: i32,
    pub picked_items: i32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    // Line items of the list. These are joined client-side and
    // are not a column of the `pick_lists` table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<PickListItem>,
}

impl PickList {
    pub fn is_completed(&self) -> bool {
        self.status == pick_list_status::COMPLETED
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == pick_list_status::IN_PROGRESS
    }

    /// Fraction of items picked, in the range [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total_items <= 0 {
            return 0.0;
        }
        (self.picked_items as f64 / self.total_items as f64).clamp(0.0, 1.0)
    }

    /// Time of the most recent change to this list.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// PickListItem is a line item of a PickList.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickListItem {
    pub id: uuid::Uuid,
    pub pick_list_id: uuid::Uuid,
    pub inventory_id: uuid::Uuid,
    pub quantity_requested: i32,
    pub quantity_picked: i32,
    pub status: String,
    #[serde(default)]
    pub picker_notes: Option<String>,
    #[serde(default)]
    pub picked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    // Product details of the referenced inventory row, joined client-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ItemProduct>,
}

/// ItemProduct is the subset of Inventory shown alongside a PickListItem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProduct {
    pub sku: String,
    pub product_name: String,
    pub location: String,
}

/// PickListUpdate is a partial update of a PickList.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PickListUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_picker_id: Option<uuid::Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picked_items: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PickListUpdate {
    /// Build an update which transitions a list to `status`.
    /// Completing a list also stamps its completion time.
    pub fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            completed_at: (status == pick_list_status::COMPLETED).then(Utc::now),
            ..Default::default()
        }
    }
}
