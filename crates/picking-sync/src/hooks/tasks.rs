use super::{deref_query, mount_query};
use crate::{Context, Error, Messages, Mutation, Query, QueryKey, Trigger};
use models::{NewTaskAssignment, Table, TaskAssignment, TaskAssignmentUpdate};
use picking_client::{fetch, insert, update, ChannelFilter, Select};
use serde_json::json;

pub const RESOURCE: &str = "taskAssignments";

const CREATE_MESSAGES: Messages = Messages {
    success: Some((
        "Task Assigned",
        "Task has been successfully assigned to picker.",
    )),
    failure: ("Assignment Failed", "Failed to assign task. Please try again."),
};

const UPDATE_MESSAGES: Messages = Messages {
    success: None,
    failure: ("Update Failed", "Failed to update task. Please try again."),
};

/// TaskAssignments observes the tasks issued within the warehouse, newest first.
pub struct TaskAssignments {
    query: Query<Vec<TaskAssignment>>,
    ctx: Context,
    create: Mutation,
    update: Mutation,
}

deref_query!(TaskAssignments, Vec<TaskAssignment>);

impl TaskAssignments {
    pub async fn mount(ctx: &Context) -> Self {
        let warehouse_id = ctx.scope().map(|scope| scope.warehouse_id);
        let key = warehouse_id.map(|id| QueryKey::new(RESOURCE).scoped(id));
        let triggers = warehouse_id
            .map(|id| Trigger::Push(ChannelFilter::warehouse(Table::TaskAssignments, id)))
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
                    Select::from(Table::TaskAssignments)
                        .eq("warehouse_id", warehouse_id)
                        .order_desc("created_at"),
                )
                .await
            }
        })
        .await;

        Self {
            query,
            ctx: ctx.clone(),
            create: Mutation::new(ctx.query.clone(), ctx.toaster.clone(), &[RESOURCE]),
            update: Mutation::new(ctx.query.clone(), ctx.toaster.clone(), &[RESOURCE]),
        }
    }

    /// Assign a task. The issuing profile is its supervisor,
    /// and the task belongs to the profile's warehouse.
    pub async fn create(&self, task: NewTaskAssignment) -> Result<TaskAssignment, Error> {
        let scope = self.ctx.scope().ok_or(Error::ScopeUnavailable)?;
        let backend = self.ctx.backend.clone();

        self.create
            .run(CREATE_MESSAGES, async move {
                let mut row = serde_json::to_value(&task)?;
                row["supervisor_id"] = json!(scope.profile.id);
                row["warehouse_id"] = json!(scope.warehouse_id);

                insert(backend.as_ref(), Table::TaskAssignments, &row).await
            })
            .await
    }

    pub async fn update(
        &self,
        id: uuid::Uuid,
        patch: TaskAssignmentUpdate,
    ) -> Result<TaskAssignment, Error> {
        let backend = self.ctx.backend.clone();

        self.update
            .run(UPDATE_MESSAGES, async move {
                update(backend.as_ref(), Table::TaskAssignments, id, &patch).await
            })
            .await
    }

    pub fn is_creating(&self) -> bool {
        self.create.is_pending()
    }

    pub fn is_updating(&self) -> bool {
        self.update.is_pending()
    }
}
