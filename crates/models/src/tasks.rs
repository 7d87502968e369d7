use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Well-known values of `TaskAssignment::status`.
pub mod task_status {
    pub const PENDING: &str = "pending";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const COMPLETED: &str = "completed";
    pub const CANCELLED: &str = "cancelled";
}

/// TaskAssignment is a task issued by a supervisor to a picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: uuid::Uuid,
    pub warehouse_id: uuid::Uuid,
    pub supervisor_id: uuid::Uuid,
    pub picker_id: uuid::Uuid,
    pub task_type: String,
    #[serde(default)]
    pub task_id: Option<String>,
    pub priority: String,
    pub status: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// NewTaskAssignment is the inserted shape of a TaskAssignment.
/// `supervisor_id` and `warehouse_id` are taken from the issuing profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTaskAssignment {
    pub picker_id: uuid::Uuid,
    pub task_type: String,
    pub priority: String,
    pub status: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// TaskAssignmentUpdate is a partial update of a TaskAssignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picker_id: Option<uuid::Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TaskAssignmentUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = TaskAssignmentUpdate {
            status: Some(task_status::COMPLETED.to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"status": "completed"})
        );
        assert!(TaskAssignmentUpdate::default().is_empty());
    }
}
