use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Warehouse is the read-only context which scopes all other entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: uuid::Uuid,
    pub name: String,
    pub location: String,
    pub manager_id: Option<uuid::Uuid>,
    // Kind of external WMS integration, such as "sap" or "manhattan".
    #[serde(default)]
    pub wms_integration_type: Option<String>,
    // Opaque configuration of the WMS integration.
    #[serde(default)]
    pub wms_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
