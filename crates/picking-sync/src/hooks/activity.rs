use super::{deref_query, mount_query};
use crate::{Context, Error, Messages, Mutation, Query, QueryKey, Trigger};
use models::{ActivityLog, DamageReport, NewActivity, Table, DAMAGE_REPORT};
use picking_client::{fetch, insert, ChannelFilter, EventKind, Select};

pub const RESOURCE: &str = "damageReports";

const REPORT_MESSAGES: Messages = Messages {
    success: Some((
        "Damage Report Submitted",
        "Your damage report has been submitted for review.",
    )),
    failure: ("Report Failed", "Failed to submit damage report. Please try again."),
};

/// DamageReports observes damage reports logged within the warehouse, newest first.
pub struct DamageReports {
    query: Query<Vec<ActivityLog>>,
    ctx: Context,
    report: Mutation,
}

deref_query!(DamageReports, Vec<ActivityLog>);

impl DamageReports {
    pub async fn mount(ctx: &Context) -> Self {
        let warehouse_id = ctx.scope().map(|scope| scope.warehouse_id);
        let key = warehouse_id.map(|id| QueryKey::new(RESOURCE).scoped(id));
        let triggers = warehouse_id
            .map(|id| {
                Trigger::Push(
                    ChannelFilter::warehouse(Table::ActivityLog, id).only(EventKind::Insert),
                )
            })
            .into_iter()
            .collect();

        let backend = ctx.backend.clone();
        let query = mount_query(ctx, key, triggers, move || {
            let backend = backend.clone();

            async move {
                let Some(warehouse_id) = warehouse_id else {
                    return Ok(Vec::new());
                };
                fetch(
                    backend.as_ref(),
                    Select::from(Table::ActivityLog)
                        .eq("warehouse_id", warehouse_id)
                        .eq("activity_type", DAMAGE_REPORT)
                        .order_desc("created_at"),
                )
                .await
            }
        })
        .await;

        Self {
            query,
            ctx: ctx.clone(),
            report: Mutation::new(ctx.query.clone(), ctx.toaster.clone(), &[RESOURCE]),
        }
    }

    /// Log a damage report on behalf of the current profile.
    pub async fn report_damage(
        &self,
        report: DamageReport,
        description: String,
    ) -> Result<ActivityLog, Error> {
        let scope = self.ctx.scope().ok_or(Error::ScopeUnavailable)?;
        let backend = self.ctx.backend.clone();

        let activity =
            NewActivity::damage_report(scope.warehouse_id, scope.profile.id, description, &report);

        self.report
            .run(REPORT_MESSAGES, async move {
                insert(backend.as_ref(), Table::ActivityLog, &activity).await
            })
            .await
    }

    pub fn is_reporting(&self) -> bool {
        self.report.is_pending()
    }

    /// Decoded reports, paired with their activity rows.
    pub fn reports(&self) -> Vec<(ActivityLog, DamageReport)> {
        self.data_or_default()
            .iter()
            .filter_map(|log| log.damage_report().map(|report| (log.clone(), report)))
            .collect()
    }
}
