use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// PerformanceMetric is a per-picker, per-day aggregate.
/// There's one row per (picker_id, date), upserted server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub id: uuid::Uuid,
    pub warehouse_id: uuid::Uuid,
    pub picker_id: uuid::Uuid,
    pub date: NaiveDate,
    pub total_picks: i32,
    pub successful_picks: i32,
    pub exceptions: i32,
    #[serde(default)]
    pub efficiency_score: Option<f64>,
    // Postgres interval, rendered as text (ex "00:00:35").
    #[serde(default)]
    pub average_pick_time: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    // Name of the picker, joined client-side from `profiles`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picker_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picker_employee_id: Option<String>,
}

impl PerformanceMetric {
    /// Percentage of picks which succeeded, or None if there were no picks.
    pub fn accuracy(&self) -> Option<f64> {
        percentage(self.successful_picks, self.total_picks)
    }
}

/// CategoryPerformance is a per-category, per-day aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPerformance {
    pub id: uuid::Uuid,
    pub warehouse_id: uuid::Uuid,
    pub category: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub total_picks: Option<i32>,
    #[serde(default)]
    pub successful_picks: Option<i32>,
    #[serde(default)]
    pub failed_picks: Option<i32>,
    #[serde(default)]
    pub average_time_minutes: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CategoryPerformance {
    pub fn success_rate(&self) -> Option<f64> {
        percentage(
            self.successful_picks.unwrap_or_default(),
            self.total_picks.unwrap_or_default(),
        )
    }
}

fn percentage(numerator: i32, denominator: i32) -> Option<f64> {
    if denominator <= 0 {
        None
    } else {
        Some(numerator as f64 * 100.0 / denominator as f64)
    }
}
