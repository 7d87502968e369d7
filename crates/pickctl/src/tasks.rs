use crate::output::{to_table_row, CliOutput, JsonCell};
use models::{task_status, TaskAssignment, TaskAssignmentUpdate};
use picking_sync::hooks;
use picking_sync::widgets::{self, Form, TaskAssignmentFields};

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Tasks {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// List task assignments of the warehouse, newest first.
    List,
    /// Assign a task to a picker.
    ///
    /// Only supervisors and admins may assign work.
    Assign(Assign),
    /// Update a task assignment.
    Update(Update),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Assign {
    /// Profile ID of the picker to assign.
    #[clap(long)]
    picker: uuid::Uuid,
    #[clap(long, default_value = "pick_list", value_parser = clap::builder::PossibleValuesParser::new(widgets::TASK_TYPES.iter().copied()))]
    task_type: String,
    #[clap(long, default_value = "medium", value_parser = clap::builder::PossibleValuesParser::new(widgets::PRIORITIES.iter().copied()))]
    priority: String,
    /// Date by which the task is due, as YYYY-MM-DD.
    #[clap(long)]
    due_date: Option<chrono::NaiveDate>,
    #[clap(long, default_value = "")]
    notes: String,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Update {
    /// ID of the task assignment.
    #[clap(long)]
    id: uuid::Uuid,
    #[clap(long, value_parser = clap::builder::PossibleValuesParser::new(TASK_STATUSES.iter().copied()))]
    status: Option<String>,
    #[clap(long, value_parser = clap::builder::PossibleValuesParser::new(widgets::PRIORITIES.iter().copied()))]
    priority: Option<String>,
    /// Reassign the task to another picker.
    #[clap(long)]
    picker: Option<uuid::Uuid>,
    #[clap(long)]
    due_date: Option<chrono::NaiveDate>,
    #[clap(long)]
    notes: Option<String>,
}

const TASK_STATUSES: &[&str] = &[
    task_status::PENDING,
    task_status::IN_PROGRESS,
    task_status::COMPLETED,
    task_status::CANCELLED,
];

impl Tasks {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        let profile = ctx.profile().await?;
        let sync = ctx.sync().await?;
        let tasks = hooks::TaskAssignments::mount(&sync).await;

        match &self.cmd {
            Command::List => {
                let rows = tasks.read().await?;
                ctx.write_all(rows.iter().cloned())
            }
            Command::Assign(assign) => {
                if !profile.role.can_assign_work() {
                    anyhow::bail!("a {} cannot assign tasks", profile.role);
                }

                let mut form = Form::<TaskAssignmentFields>::new();
                *form.fields_mut() = TaskAssignmentFields {
                    picker_id: Some(assign.picker),
                    task_type: assign.task_type.clone(),
                    priority: assign.priority.clone(),
                    due_date: assign.due_date,
                    notes: assign.notes.clone(),
                };

                let created = form.assign(&tasks).await;
                ctx.flush_toasts();

                ctx.write_all(Some(created?))
            }
            Command::Update(update) => {
                let patch = TaskAssignmentUpdate {
                    picker_id: update.picker,
                    priority: update.priority.clone(),
                    status: update.status.clone(),
                    due_date: update.due_date,
                    notes: update.notes.clone(),
                };
                if patch.is_empty() {
                    anyhow::bail!("nothing to update: pass at least one of --status, --priority, --picker, --due-date, or --notes");
                }

                let updated = tasks.update(update.id, patch).await;
                ctx.flush_toasts();

                ctx.write_all(Some(updated?))
            }
        }
    }
}

impl CliOutput for TaskAssignment {
    type CellValue = JsonCell;

    fn table_headers() -> Vec<&'static str> {
        vec![
            "ID", "Picker", "Type", "Priority", "Status", "Due", "Notes", "Assigned",
        ]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        to_table_row(
            self,
            &[
                "/id",
                "/picker_id",
                "/task_type",
                "/priority",
                "/status",
                "/due_date",
                "/notes",
                "/assigned_at",
            ],
        )
    }
}
