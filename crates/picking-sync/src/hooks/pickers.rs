use super::{deref_query, mount_query};
use crate::{Context, Query, QueryKey, Trigger};
use chrono::{DateTime, NaiveDate, Utc};
use models::{PerformanceMetric, PickList, Profile, Role, Table};
use picking_client::{fetch, Backend, ChannelFilter, Select};
use std::time::Duration;

pub const RESOURCE: &str = "realTimePickers";

/// Interval at which picker activity is re-read, regardless of pushed changes.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Pickers without any activity in this long are offline.
pub const OFFLINE_AFTER: chrono::Duration = chrono::Duration::minutes(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PickerStatus {
    Active,
    Idle,
    Offline,
}

impl std::fmt::Display for PickerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PickerStatus::Active => "active",
            PickerStatus::Idle => "idle",
            PickerStatus::Offline => "offline",
        })
    }
}

/// PickerActivity summarizes the current work of a picker.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PickerActivity {
    pub picker_id: uuid::Uuid,
    pub name: String,
    pub employee_id: String,
    pub status: PickerStatus,
    /// List number of the most recently updated in-progress list.
    pub current_pick_list: Option<String>,
    pub total_assigned: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub exceptions: i32,
    pub efficiency: Option<f64>,
    pub pick_accuracy: Option<f64>,
    pub time_per_item_secs: Option<u32>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// RealTimePickers observes the activity of each picker of the warehouse,
/// by picker name. It's refreshed on changes to pick lists and on an interval.
pub struct RealTimePickers {
    query: Query<Vec<PickerActivity>>,
}

deref_query!(RealTimePickers, Vec<PickerActivity>);

impl RealTimePickers {
    pub async fn mount(ctx: &Context) -> Self {
        let warehouse_id = ctx.scope().map(|scope| scope.warehouse_id);
        let key = warehouse_id.map(|id| QueryKey::new(RESOURCE).scoped(id));

        let triggers = match warehouse_id {
            Some(id) => vec![
                Trigger::Push(ChannelFilter::warehouse(Table::PickLists, id)),
                Trigger::Interval(POLL_INTERVAL),
            ],
            None => Vec::new(),
        };

        let backend = ctx.backend.clone();
        let query = mount_query(ctx, key, triggers, move || {
            let backend = backend.clone();

            async move {
                match warehouse_id {
                    Some(warehouse_id) => fetch_activity(backend.as_ref(), warehouse_id).await,
                    None => Ok(Vec::new()),
                }
            }
        })
        .await;

        Self { query }
    }
}

async fn fetch_activity(
    backend: &dyn Backend,
    warehouse_id: uuid::Uuid,
) -> anyhow::Result<Vec<PickerActivity>> {
    let now = Utc::now();

    let pickers: Vec<Profile> = fetch(
        backend,
        Select::from(Table::Profiles)
            .eq("warehouse_id", warehouse_id)
            .eq("role", Role::Picker)
            .order_asc("full_name"),
    )
    .await?;

    let lists: Vec<PickList> = fetch(
        backend,
        Select::from(Table::PickLists).eq("warehouse_id", warehouse_id),
    )
    .await?;

    let metrics: Vec<PerformanceMetric> = fetch(
        backend,
        Select::from(Table::PerformanceMetrics)
            .eq("warehouse_id", warehouse_id)
            .eq("date", now.date_naive()),
    )
    .await?;

    Ok(summarize(&pickers, &lists, &metrics, now))
}

/// Summarize the activity of each of `pickers` as of `now`.
pub fn summarize(
    pickers: &[Profile],
    lists: &[PickList],
    metrics: &[PerformanceMetric],
    now: DateTime<Utc>,
) -> Vec<PickerActivity> {
    let today: NaiveDate = now.date_naive();

    pickers
        .iter()
        .map(|picker| {
            let assigned: Vec<&PickList> = lists
                .iter()
                .filter(|list| list.assigned_picker_id == Some(picker.id))
                .collect();

            let in_progress: Vec<&PickList> = assigned
                .iter()
                .copied()
                .filter(|list| list.is_in_progress())
                .collect();

            let current_pick_list = in_progress
                .iter()
                .max_by_key(|list| list.last_activity())
                .map(|list| list.list_number.clone());

            let last_activity = assigned.iter().filter_map(|list| list.last_activity()).max();
            let metric = metrics
                .iter()
                .find(|m| m.picker_id == picker.id && m.date == today);

            let status = if !in_progress.is_empty() {
                PickerStatus::Active
            } else if last_activity.map_or(true, |at| now - at > OFFLINE_AFTER) {
                PickerStatus::Offline
            } else {
                PickerStatus::Idle
            };

            PickerActivity {
                picker_id: picker.id,
                name: picker.full_name.clone(),
                employee_id: picker.employee_id.clone(),
                status,
                current_pick_list,
                total_assigned: assigned.len(),
                completed: assigned.iter().filter(|list| list.is_completed()).count(),
                in_progress: in_progress.len(),
                exceptions: metric.map(|m| m.exceptions).unwrap_or_default(),
                efficiency: metric.and_then(|m| m.efficiency_score),
                pick_accuracy: metric.and_then(PerformanceMetric::accuracy),
                time_per_item_secs: metric
                    .and_then(|m| m.average_pick_time.as_deref())
                    .and_then(interval_secs),
                last_activity,
            }
        })
        .collect()
}

// Parse a Postgres interval of the form "HH:MM:SS[.ffffff]" into whole seconds.
fn interval_secs(interval: &str) -> Option<u32> {
    let mut parts = interval.split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let s: f64 = s.parse().ok()?;

    Some(h.parse::<u32>().ok()? * 3600 + m.parse::<u32>().ok()? * 60 + s as u32)
}
