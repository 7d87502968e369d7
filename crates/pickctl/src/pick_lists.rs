use crate::output::{to_table_row, CliOutput, JsonCell};
use models::PickList;
use picking_sync::hooks;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct PickLists {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// List pick lists of the warehouse.
    ///
    /// Pickers see only the lists assigned to them.
    List(List),
    /// Move a pick list to a new status.
    SetStatus(SetStatus),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct List {
    /// Show only lists which are not completed.
    #[clap(long)]
    open: bool,
    /// Include the items of each list (JSON and YAML output only).
    #[clap(long)]
    items: bool,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct SetStatus {
    /// ID of the pick list.
    #[clap(long)]
    id: uuid::Uuid,
    /// New status of the pick list.
    #[clap(long, value_parser = clap::builder::PossibleValuesParser::new(hooks::pick_lists::STATUSES.iter().copied()))]
    status: String,
}

impl PickLists {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        let sync = ctx.sync().await?;
        let pick_lists = hooks::PickLists::mount(&sync).await;

        match &self.cmd {
            Command::List(List { open, items }) => {
                let mut lists = if *open {
                    pick_lists.read().await?;
                    pick_lists.open_lists()
                } else {
                    (*pick_lists.read().await?).clone()
                };
                if !items {
                    lists.iter_mut().for_each(|list| list.items.clear());
                }
                ctx.write_all(lists)
            }
            Command::SetStatus(SetStatus { id, status }) => {
                let updated = pick_lists.update_status(*id, status).await;
                ctx.flush_toasts();

                ctx.write_all(Some(updated?))
            }
        }
    }
}

impl CliOutput for PickList {
    type CellValue = String;

    fn table_headers() -> Vec<&'static str> {
        vec!["ID", "List", "Status", "Priority", "Progress", "Updated"]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        vec![
            self.id.to_string(),
            self.list_number.clone(),
            self.status.clone(),
            self.priority.clone(),
            format!(
                "{}/{} ({:.0}%)",
                self.picked_items,
                self.total_items,
                self.progress() * 100.0
            ),
            crate::format_time(self.last_activity()),
        ]
    }
}

/// Row of a pick list within a dashboard, naming its assignee.
#[derive(serde::Serialize)]
pub struct Assigned<'a> {
    #[serde(flatten)]
    pub list: &'a PickList,
    pub picker: Option<String>,
}

impl CliOutput for Assigned<'_> {
    type CellValue = JsonCell;

    fn table_headers() -> Vec<&'static str> {
        vec!["List", "Picker", "Status", "Priority", "Picked", "Total"]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        to_table_row(
            self,
            &[
                "/list_number",
                "/picker",
                "/status",
                "/priority",
                "/picked_items",
                "/total_items",
            ],
        )
    }
}
