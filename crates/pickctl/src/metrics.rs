use crate::output::CliOutput;
use models::{CategoryPerformance, PerformanceMetric};
use picking_sync::hooks::{CategoryPerformanceHook, PerformanceMetrics};

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Metrics {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Show daily performance of each picker, newest first.
    Pickers(Since),
    /// Show daily performance of each product category, newest first.
    Categories(Since),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Since {
    /// Show only metrics on or after this date, as YYYY-MM-DD.
    #[clap(long)]
    since: Option<chrono::NaiveDate>,
}

impl Metrics {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        let sync = ctx.sync().await?;

        match &self.cmd {
            Command::Pickers(Since { since }) => {
                let metrics = PerformanceMetrics::mount(&sync).await;
                let rows = metrics.read().await?;

                ctx.write_all(
                    rows.iter()
                        .filter(|row| since.map_or(true, |since| row.date >= since))
                        .cloned(),
                )
            }
            Command::Categories(Since { since }) => {
                let categories = CategoryPerformanceHook::mount(&sync).await;
                let rows = categories.read().await?;

                ctx.write_all(
                    rows.iter()
                        .filter(|row| since.map_or(true, |since| row.date >= since))
                        .cloned(),
                )
            }
        }
    }
}

impl CliOutput for PerformanceMetric {
    type CellValue = String;

    fn table_headers() -> Vec<&'static str> {
        vec![
            "Date", "Picker", "Picks", "Accuracy", "Exceptions", "Efficiency", "Avg Pick Time",
        ]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        let accuracy = crate::format_percent(self.accuracy());
        let picker = match (self.picker_name, self.picker_employee_id) {
            (Some(name), Some(employee_id)) => format!("{name} ({employee_id})"),
            (Some(name), None) => name,
            _ => self.picker_id.to_string(),
        };

        vec![
            self.date.to_string(),
            picker,
            self.total_picks.to_string(),
            accuracy,
            self.exceptions.to_string(),
            self.efficiency_score
                .map(|score| format!("{score:.1}"))
                .unwrap_or_default(),
            self.average_pick_time.unwrap_or_default(),
        ]
    }
}

impl CliOutput for CategoryPerformance {
    type CellValue = String;

    fn table_headers() -> Vec<&'static str> {
        vec!["Date", "Category", "Picks", "Failed", "Success Rate", "Avg Minutes"]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        vec![
            self.date.to_string(),
            self.category.clone(),
            self.total_picks.unwrap_or_default().to_string(),
            self.failed_picks.unwrap_or_default().to_string(),
            crate::format_percent(self.success_rate()),
            self.average_time_minutes
                .map(|minutes| format!("{minutes:.1}"))
                .unwrap_or_default(),
        ]
    }
}
