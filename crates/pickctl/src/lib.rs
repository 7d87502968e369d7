use anyhow::Context as _;
use clap::Parser;
use models::Profile;
use picking_sync::{toast, AuthProvider, AuthState, Toaster};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

mod auth;
mod chat;
mod config;
mod damage;
mod dashboard;
mod inventory;
mod metrics;
mod output;
mod pick_lists;
mod pickers;
mod tasks;

use output::{Output, OutputType};

/// A command-line tool for working the floor of a warehouse.
#[derive(Debug, Parser)]
#[clap(author, about, version)]
pub struct Cli {
    /// Configuration profile to use.
    ///
    /// Profiles are distinct configurations of the `pickctl` tool, and are
    /// completely optional. Use multiple profiles to track multiple accounts
    /// or projects.
    #[clap(long, default_value = "default", env = "PICKCTL_PROFILE")]
    profile: String,

    /// Directory of profile configurations.
    #[clap(long, env = "PICKCTL_CONFIG_DIR", hide = true)]
    config_dir: Option<PathBuf>,

    #[clap(flatten)]
    api: config::ApiArgs,

    #[clap(subcommand)]
    cmd: Command,

    #[clap(flatten)]
    output: Output,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Sign in, sign up, or sign out.
    Auth(auth::Auth),
    /// Show the dashboard of your role.
    ///
    /// Pickers see their pick lists, chat, and damage reports. Supervisors see
    /// picker activity, task assignments, performance, inventory, and chat.
    /// Admins additionally see every pick list of the warehouse.
    Dashboard(dashboard::Dashboard),
    /// Work with pick lists.
    PickLists(pick_lists::PickLists),
    /// Work with task assignments.
    Tasks(tasks::Tasks),
    /// Read and send warehouse chat messages.
    Chat(chat::Chat),
    /// Work with warehouse inventory.
    Inventory(inventory::Inventory),
    /// Show picker and category performance metrics.
    Metrics(metrics::Metrics),
    /// Show the current activity of pickers.
    Pickers(pickers::Pickers),
    /// Work with damage reports.
    Damage(damage::Damage),
}

pub struct CliContext {
    output: Output,
    // Provider of the current user. It's None after signing out.
    auth: Option<AuthProvider>,
    toasts: broadcast::Receiver<toast::Toast>,
    // Context of mounted hooks, created on first use.
    sync: Option<picking_sync::Context>,
}

impl CliContext {
    pub fn auth(&self) -> anyhow::Result<&AuthProvider> {
        self.auth.as_ref().context("already signed out")
    }

    /// Take the AuthProvider, in order to sign out.
    pub fn take_auth(&mut self) -> Option<AuthProvider> {
        self.sync = None;
        self.auth.take()
    }

    /// Resolve the Profile of the signed-in user.
    pub async fn profile(&mut self) -> anyhow::Result<Profile> {
        let state = self.auth()?.resolved().await;
        self.flush_toasts();

        match state {
            AuthState::Authenticated {
                profile: Some(profile),
                ..
            } => Ok(profile),
            AuthState::Authenticated {
                profile_error: Some(err),
                ..
            } => Err(err).context("signed in, but your profile couldn't be loaded"),
            _ => anyhow::bail!("You must run `auth login` first"),
        }
    }

    /// Returns the Context of mounted hooks, creating it if necessary.
    /// This fails if there is no signed-in user with a Profile.
    pub async fn sync(&mut self) -> anyhow::Result<picking_sync::Context> {
        let profile = self.profile().await?;

        if self.sync.is_none() {
            tracing::debug!(profile = %profile.id, role = %profile.role, "creating sync context");
            self.sync = Some(picking_sync::Context::new(self.auth()?));
        }
        self.sync.clone().context("sync context is not available")
    }

    pub fn write_all<I, T>(&mut self, items: I) -> anyhow::Result<()>
    where
        T: output::CliOutput,
        I: IntoIterator<Item = T>,
    {
        match self.get_output_type() {
            OutputType::Json => output::print_json(items),
            OutputType::Yaml => output::print_yaml(items),
            OutputType::Table => output::print_table(items),
        }
    }

    /// Write `items` under a `title`, which is shown only in table output.
    pub fn write_section<I, T>(&mut self, title: &str, items: I) -> anyhow::Result<()>
    where
        T: output::CliOutput,
        I: IntoIterator<Item = T>,
    {
        if self.get_output_type() == OutputType::Table {
            println!("{title}");
        }
        self.write_all(items)
    }

    pub fn get_output_type(&mut self) -> OutputType {
        use crossterm::tty::IsTty;

        if let Some(ty) = self.output.output {
            ty
        } else if std::io::stdout().is_tty() {
            OutputType::Table
        } else {
            OutputType::Yaml
        }
    }

    /// Print pending toasts to stderr.
    pub fn flush_toasts(&mut self) {
        loop {
            match self.toasts.try_recv() {
                Ok(toast) => match toast.variant {
                    toast::Variant::Default => {
                        eprintln!("{}: {}", toast.title, toast.description)
                    }
                    toast::Variant::Destructive => {
                        eprintln!("error: {}: {}", toast.title, toast.description)
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dropped notifications");
                }
                Err(_) => break,
            }
        }
    }
}

impl Cli {
    pub async fn run(&self) -> anyhow::Result<()> {
        let dir = match &self.config_dir {
            Some(dir) => dir.clone(),
            None => config::default_dir()?,
        };
        let mut config = config::Config::load(&dir, &self.profile)?;
        let api = config.resolve_api(&self.api)?;

        let store = Arc::new(config::ConfigStore::new(std::mem::take(&mut config.store)));
        let client = picking_client::Client::new(
            api.endpoint.clone(),
            api.public_token.clone(),
            store.clone(),
        );

        let toaster = Toaster::new();
        let mut context = CliContext {
            output: self.output.clone(),
            toasts: toaster.subscribe(),
            auth: Some(AuthProvider::mount(Arc::new(client), store.clone(), toaster)),
            sync: None,
        };

        let result = match &self.cmd {
            Command::Auth(auth) => auth.run(&mut context).await,
            Command::Dashboard(dashboard) => dashboard.run(&mut context).await,
            Command::PickLists(pick_lists) => pick_lists.run(&mut context).await,
            Command::Tasks(tasks) => tasks.run(&mut context).await,
            Command::Chat(chat) => chat.run(&mut context).await,
            Command::Inventory(inventory) => inventory.run(&mut context).await,
            Command::Metrics(metrics) => metrics.run(&mut context).await,
            Command::Pickers(pickers) => pickers.run(&mut context).await,
            Command::Damage(damage) => damage.run(&mut context).await,
        };
        context.flush_toasts();
        // Stop background listeners before the session is persisted.
        drop(context);

        config.api = Some(api);
        config.store = store.entries();
        config.write(&dir, &self.profile)?;

        result
    }
}

// new_table builds a comfy_table with UTF8 styling.
fn new_table(headers: Vec<&str>) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .apply_modifier(comfy_table::modifiers::UTF8_SOLID_INNER_BORDERS);

    table.set_header(headers);
    table
}

fn format_time(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn format_percent(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}%")).unwrap_or_default()
}
