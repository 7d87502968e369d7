mod activity;
mod chat;
mod inventory;
mod performance;
mod pick_lists;
mod profiles;
mod tasks;
mod warehouses;

pub use activity::{ActivityLog, DamageReport, NewActivity, DAMAGE_REPORT};
pub use chat::{ChatMessage, NewChatMessage, ProfileSummary};
pub use inventory::Inventory;
pub use performance::{CategoryPerformance, PerformanceMetric};
pub use pick_lists::{pick_list_status, ItemProduct, PickList, PickListItem, PickListUpdate};
pub use profiles::{Profile, ProfileMetadata, Role};
pub use tasks::{task_status, NewTaskAssignment, TaskAssignment, TaskAssignmentUpdate};
pub use warehouses::Warehouse;

/// Table names of the hosted warehouse schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    ActivityLog,
    CategoryPerformance,
    ChatMessages,
    Inventory,
    PerformanceMetrics,
    PickListItems,
    PickLists,
    Profiles,
    TaskAssignments,
    Warehouses,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::ActivityLog => "activity_log",
            Table::CategoryPerformance => "category_performance",
            Table::ChatMessages => "chat_messages",
            Table::Inventory => "inventory",
            Table::PerformanceMetrics => "performance_metrics",
            Table::PickListItems => "pick_list_items",
            Table::PickLists => "pick_lists",
            Table::Profiles => "profiles",
            Table::TaskAssignments => "task_assignments",
            Table::Warehouses => "warehouses",
        }
    }

    pub fn all() -> &'static [Table] {
        &[
            Table::ActivityLog,
            Table::CategoryPerformance,
            Table::ChatMessages,
            Table::Inventory,
            Table::PerformanceMetrics,
            Table::PickListItems,
            Table::PickLists,
            Table::Profiles,
            Table::TaskAssignments,
            Table::Warehouses,
        ]
    }

    /// Timestamp columns which the database populates with `now()` on insert.
    pub fn insert_timestamps(&self) -> &'static [&'static str] {
        match self {
            Table::ActivityLog | Table::ChatMessages | Table::PickListItems => &["created_at"],
            Table::TaskAssignments => &["assigned_at", "created_at", "updated_at"],
            Table::PerformanceMetrics => &["created_at"],
            _ => &["created_at", "updated_at"],
        }
    }

    /// Returns true if rows of this table carry an `updated_at` column
    /// which is bumped on every update.
    pub fn has_updated_at(&self) -> bool {
        self.insert_timestamps().contains(&"updated_at")
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Table {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::all()
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown table {s:?}"))
    }
}
