use crate::pick_lists::Assigned;
use crate::CliContext;
use picking_sync::dashboard::{AdminDashboard, PickerDashboard, SupervisorDashboard};
use picking_sync::{Dashboard as Mounted, Screen};
use std::collections::HashMap;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Dashboard {
    /// Keep running, and print the dashboard again whenever its data changes.
    #[clap(long)]
    watch: bool,
}

impl Dashboard {
    pub async fn run(&self, ctx: &mut CliContext) -> anyhow::Result<()> {
        let sync = ctx.sync().await?;

        let mut dashboard = match Screen::mount(&sync).await {
            Screen::Dashboard(dashboard) => dashboard,
            Screen::SignIn { error: Some(err) } => return Err(err.into()),
            Screen::SignIn { error: None } | Screen::Loading => {
                anyhow::bail!("You must run `auth login` first")
            }
        };
        tracing::debug!(kind = ?dashboard.kind(), "mounted dashboard");

        render(ctx, &dashboard).await?;
        if !self.watch {
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = dashboard.changed() => (),
                _ = tokio::signal::ctrl_c() => return Ok(()),
            }
            ctx.flush_toasts();

            if let Err(err) = render(ctx, &dashboard).await {
                tracing::warn!(?err, "failed to refresh dashboard");
            }
        }
    }
}

async fn render(ctx: &mut CliContext, dashboard: &Mounted) -> anyhow::Result<()> {
    match dashboard {
        Mounted::Picker(d) => render_picker(ctx, d).await,
        Mounted::Supervisor(d) => render_supervisor(ctx, d).await,
        Mounted::Admin(d) => render_admin(ctx, d).await,
    }
}

async fn render_picker(ctx: &mut CliContext, d: &PickerDashboard) -> anyhow::Result<()> {
    let lists = d.pick_lists.read().await?;
    let messages = d.chat.read().await?;
    d.damage_reports.read().await?;

    ctx.write_section("My Pick Lists", lists.iter().cloned())?;
    ctx.write_section("Messages", messages.iter().cloned())?;
    ctx.write_section(
        "Damage Reports",
        d.damage_reports
            .reports()
            .into_iter()
            .map(crate::damage::Row::new),
    )
}

async fn render_supervisor(ctx: &mut CliContext, d: &SupervisorDashboard) -> anyhow::Result<()> {
    let pickers = d.pickers.read().await?;
    let tasks = d.tasks.read().await?;
    let metrics = d.metrics.read().await?;
    let categories = d.categories.read().await?;
    let messages = d.chat.read().await?;
    d.inventory.read().await?;

    ctx.write_section("Pickers", pickers.iter().cloned())?;
    ctx.write_section("Task Assignments", tasks.iter().cloned())?;
    ctx.write_section("Picker Performance", metrics.iter().cloned())?;
    ctx.write_section("Category Performance", categories.iter().cloned())?;
    ctx.write_section("Out of Stock", d.inventory.out_of_stock())?;
    ctx.write_section("Messages", messages.iter().cloned())
}

async fn render_admin(ctx: &mut CliContext, d: &AdminDashboard) -> anyhow::Result<()> {
    render_supervisor(ctx, &d.supervisor).await?;

    let lists = d.pick_lists.read().await?;
    let names: HashMap<uuid::Uuid, String> = d
        .supervisor
        .pickers
        .data_or_default()
        .iter()
        .map(|picker| (picker.picker_id, picker.name.clone()))
        .collect();

    ctx.write_section(
        "All Pick Lists",
        lists.iter().map(|list| Assigned {
            list,
            picker: list
                .assigned_picker_id
                .map(|id| names.get(&id).cloned().unwrap_or_else(|| id.to_string())),
        }),
    )
}
