use super::{deref_query, mount_query};
use crate::{Context, Query, QueryKey};
use models::{CategoryPerformance, PerformanceMetric, Profile, Table};
use picking_client::{fetch, Backend, Select};
use std::collections::HashMap;

pub const METRICS_RESOURCE: &str = "performanceMetrics";
pub const CATEGORIES_RESOURCE: &str = "categoryPerformance";

/// PerformanceMetrics observes daily picker metrics of the warehouse,
/// newest first, with the name of each picker.
pub struct PerformanceMetrics {
    query: Query<Vec<PerformanceMetric>>,
}

deref_query!(PerformanceMetrics, Vec<PerformanceMetric>);

impl PerformanceMetrics {
    pub async fn mount(ctx: &Context) -> Self {
        let warehouse_id = ctx.scope().map(|scope| scope.warehouse_id);
        let key = warehouse_id.map(|id| QueryKey::new(METRICS_RESOURCE).scoped(id));

        let backend = ctx.backend.clone();
        let query = mount_query(ctx, key, Vec::new(), move || {
            let backend = backend.clone();

            async move {
                match warehouse_id {
                    Some(warehouse_id) => fetch_metrics(backend.as_ref(), warehouse_id).await,
                    None => Ok(Vec::new()),
                }
            }
        })
        .await;

        Self { query }
    }
}

async fn fetch_metrics(
    backend: &dyn Backend,
    warehouse_id: uuid::Uuid,
) -> anyhow::Result<Vec<PerformanceMetric>> {
    let mut metrics: Vec<PerformanceMetric> = fetch(
        backend,
        Select::from(Table::PerformanceMetrics)
            .eq("warehouse_id", warehouse_id)
            .order_desc("date"),
    )
    .await?;

    let pickers = profiles_by_id(backend, warehouse_id, metrics.iter().map(|m| m.picker_id)).await?;

    for metric in &mut metrics {
        if let Some(picker) = pickers.get(&metric.picker_id) {
            metric.picker_name = Some(picker.full_name.clone());
            metric.picker_employee_id = Some(picker.employee_id.clone());
        }
    }
    Ok(metrics)
}

/// Fetch the Profiles of `ids` within the warehouse, keyed on their id.
pub(crate) async fn profiles_by_id<I>(
    backend: &dyn Backend,
    warehouse_id: uuid::Uuid,
    ids: I,
) -> anyhow::Result<HashMap<uuid::Uuid, Profile>>
where
    I: IntoIterator<Item = uuid::Uuid>,
{
    let mut ids: Vec<uuid::Uuid> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();

    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let profiles: Vec<Profile> = fetch(
        backend,
        Select::from(Table::Profiles)
            .eq("warehouse_id", warehouse_id)
            .in_("id", ids),
    )
    .await?;

    Ok(profiles.into_iter().map(|p| (p.id, p)).collect())
}

/// CategoryPerformanceHook observes daily per-category aggregates of the
/// warehouse, newest first and then by descending pick volume.
pub struct CategoryPerformanceHook {
    query: Query<Vec<CategoryPerformance>>,
}

deref_query!(CategoryPerformanceHook, Vec<CategoryPerformance>);

impl CategoryPerformanceHook {
    pub async fn mount(ctx: &Context) -> Self {
        let warehouse_id = ctx.scope().map(|scope| scope.warehouse_id);
        let key = warehouse_id.map(|id| QueryKey::new(CATEGORIES_RESOURCE).scoped(id));

        let backend = ctx.backend.clone();
        let query = mount_query(ctx, key, Vec::new(), move || {
            let backend = backend.clone();

            async move {
                let Some(warehouse_id) = warehouse_id else {
                    return Ok(Vec::new());
                };
                fetch(
                    backend.as_ref(),
                    Select::from(Table::CategoryPerformance)
                        .eq("warehouse_id", warehouse_id)
                        .order_desc("date")
                        .order_desc("total_picks"),
                )
                .await
            }
        })
        .await;

        Self { query }
    }
}
