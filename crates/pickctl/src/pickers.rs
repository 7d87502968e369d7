use crate::output::CliOutput;
use picking_sync::hooks::{PickerActivity, RealTimePickers};

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Pickers {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Show whether each picker is active, idle, or offline,
    /// with their current pick list and today's performance.
    Status,
}

impl Pickers {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        let sync = ctx.sync().await?;

        match &self.cmd {
            Command::Status => {
                let pickers = RealTimePickers::mount(&sync).await;
                let activity = pickers.read().await?;
                ctx.write_all(activity.iter().cloned())
            }
        }
    }
}

impl CliOutput for PickerActivity {
    type CellValue = String;

    fn table_headers() -> Vec<&'static str> {
        vec![
            "Picker",
            "Status",
            "Current List",
            "Assigned",
            "Done",
            "Active",
            "Exceptions",
            "Accuracy",
            "Sec/Item",
            "Last Activity",
        ]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        vec![
            format!("{} ({})", self.name, self.employee_id),
            self.status.to_string(),
            self.current_pick_list.unwrap_or_default(),
            self.total_assigned.to_string(),
            self.completed.to_string(),
            self.in_progress.to_string(),
            self.exceptions.to_string(),
            crate::format_percent(self.pick_accuracy),
            self.time_per_item_secs
                .map(|secs| secs.to_string())
                .unwrap_or_default(),
            crate::format_time(self.last_activity),
        ]
    }
}
