use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity type under which damage reports are logged.
pub const DAMAGE_REPORT: &str = "damage_report";

/// ActivityLog is an append-only record of user activity in a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: uuid::Uuid,
    pub warehouse_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub activity_type: String,
    pub description: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ActivityLog {
    /// Decode the DamageReport carried by this activity, if it is one.
    pub fn damage_report(&self) -> Option<DamageReport> {
        if self.activity_type != DAMAGE_REPORT {
            return None;
        }
        let metadata = self.metadata.clone()?;
        serde_json::from_value(metadata).ok()
    }
}

/// DamageReport describes a damaged, expired, or otherwise unpickable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    pub sku: String,
    #[serde(default)]
    pub item_name: String,
    // One of packaging, expiry, quality, wrong-item, quantity, or other.
    pub damage_type: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default = "pending")]
    pub status: String,
}

fn pending() -> String {
    "pending".to_string()
}

/// NewActivity is the inserted shape of an ActivityLog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub warehouse_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub activity_type: String,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

impl NewActivity {
    pub fn damage_report(
        warehouse_id: uuid::Uuid,
        user_id: uuid::Uuid,
        description: String,
        report: &DamageReport,
    ) -> Self {
        Self {
            warehouse_id,
            user_id,
            activity_type: DAMAGE_REPORT.to_string(),
            description,
            metadata: serde_json::to_value(report).ok(),
        }
    }
}
