use crate::output::CliOutput;
use models::{ActivityLog, DamageReport};
use picking_sync::hooks::DamageReports;
use picking_sync::widgets::{self, DamageReportFields, Form};

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Damage {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// List damage reports of the warehouse, newest first.
    List,
    /// Report a damaged item.
    Report(Report),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Report {
    /// SKU of the damaged item.
    #[clap(long)]
    sku: String,
    /// Name of the damaged item.
    #[clap(long, default_value = "")]
    item_name: String,
    #[clap(long, value_parser = clap::builder::PossibleValuesParser::new(widgets::DAMAGE_TYPES.iter().copied()))]
    damage_type: String,
    /// Description of the damage.
    #[clap(long)]
    description: String,
    /// URL of a photo of the damage. May be repeated.
    #[clap(long = "photo")]
    photos: Vec<String>,
}

/// A damage report, together with the activity which logged it.
#[derive(serde::Serialize)]
pub struct Row {
    pub id: uuid::Uuid,
    pub reported_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reported_by: uuid::Uuid,
    pub description: String,
    #[serde(flatten)]
    pub report: DamageReport,
}

impl Row {
    pub(crate) fn new((log, report): (ActivityLog, DamageReport)) -> Self {
        Self {
            id: log.id,
            reported_at: log.created_at,
            reported_by: log.user_id,
            description: log.description,
            report,
        }
    }
}

impl Damage {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        let sync = ctx.sync().await?;
        let reports = DamageReports::mount(&sync).await;

        match &self.cmd {
            Command::List => {
                reports.read().await?;
                ctx.write_all(reports.reports().into_iter().map(Row::new))
            }
            Command::Report(report) => {
                let mut form = Form::<DamageReportFields>::new();
                *form.fields_mut() = DamageReportFields {
                    sku: report.sku.clone(),
                    item_name: report.item_name.clone(),
                    damage_type: report.damage_type.clone(),
                    description: report.description.clone(),
                    photos: report.photos.clone(),
                };

                let logged = form.report(&reports).await;
                ctx.flush_toasts();

                let log = logged?;
                match log.damage_report() {
                    Some(decoded) => ctx.write_all(Some(Row::new((log, decoded)))),
                    None => anyhow::bail!("logged activity {} is not a damage report", log.id),
                }
            }
        }
    }
}

impl CliOutput for Row {
    type CellValue = String;

    fn table_headers() -> Vec<&'static str> {
        vec!["Reported", "SKU", "Item", "Damage", "Status", "Photos", "Description"]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        vec![
            crate::format_time(self.reported_at),
            self.report.sku,
            self.report.item_name,
            self.report.damage_type,
            self.report.status,
            self.report.photos.len().to_string(),
            self.description,
        ]
    }
}
