use crate::output::{to_table_row, CliOutput, JsonCell};
use anyhow::Context;
use models::{Profile, ProfileMetadata, Role};
use picking_sync::AuthState;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Auth {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Sign in with an email and password.
    ///
    /// The session is stored in the profile configuration,
    /// and is refreshed as needed by later commands.
    Login(Login),
    /// Register a new account.
    ///
    /// This doesn't sign you in: verify your email, and then run `auth login`.
    Signup(Signup),
    /// Sign out of every session of the current user.
    Logout,
    /// Show the signed-in user and their profile.
    Status,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Login {
    #[clap(long)]
    email: String,
    #[clap(long, env = "PICKCTL_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Signup {
    #[clap(long)]
    email: String,
    #[clap(long, env = "PICKCTL_PASSWORD", hide_env_values = true)]
    password: String,
    /// Full name of the new user.
    #[clap(long)]
    full_name: String,
    /// Employee ID of the new user.
    #[clap(long)]
    employee_id: String,
    /// Role of the new user: picker, supervisor, or admin.
    #[clap(long, default_value = "picker")]
    role: Role,
}

impl Auth {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Login(login) => do_login(ctx, login).await,
            Command::Signup(signup) => do_signup(ctx, signup).await,
            Command::Logout => do_logout(ctx).await,
            Command::Status => do_status(ctx).await,
        }
    }
}

async fn do_login(
    ctx: &mut crate::CliContext,
    Login { email, password }: &Login,
) -> anyhow::Result<()> {
    let auth = ctx.auth()?;
    let mut changes = auth.subscribe();

    let signed_in = auth.sign_in(email, password).await;
    ctx.flush_toasts();
    signed_in?;

    // Wait for the Profile of the signed-in user to load, or fail to.
    changes
        .wait_for(|state| match state {
            AuthState::Authenticated {
                user,
                profile,
                profile_error,
            } => {
                user.email.as_deref() == Some(email.as_str())
                    && (profile.is_some() || profile_error.is_some())
            }
            _ => false,
        })
        .await
        .context("auth listener stopped")?;

    let profile = ctx.profile().await?;
    tracing::debug!(profile = %profile.id, "signed in");

    ctx.write_all(Some(profile))
}

async fn do_signup(ctx: &mut crate::CliContext, signup: &Signup) -> anyhow::Result<()> {
    let metadata = ProfileMetadata {
        full_name: signup.full_name.clone(),
        employee_id: signup.employee_id.clone(),
        role: signup.role,
    };

    let result = ctx
        .auth()?
        .sign_up(&signup.email, &signup.password, &metadata)
        .await;
    ctx.flush_toasts();

    Ok(result?)
}

async fn do_logout(ctx: &mut crate::CliContext) -> anyhow::Result<()> {
    let Some(auth) = ctx.take_auth() else {
        return Ok(());
    };
    auth.sign_out().await;

    println!("Signed out.");
    Ok(())
}

async fn do_status(ctx: &mut crate::CliContext) -> anyhow::Result<()> {
    let state = ctx.auth()?.resolved().await;

    match state {
        AuthState::Authenticated {
            profile: Some(profile),
            ..
        } => ctx.write_all(Some(profile)),
        AuthState::Authenticated {
            user,
            profile_error,
            ..
        } => {
            let email = user.email.unwrap_or_default();
            match profile_error {
                Some(err) => {
                    println!("Signed in as {email}, but your profile couldn't be loaded: {err}")
                }
                None => println!("Signed in as {email}."),
            }
            Ok(())
        }
        _ => {
            println!("Not signed in.");
            Ok(())
        }
    }
}

impl CliOutput for Profile {
    type CellValue = JsonCell;

    fn table_headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Employee ID", "Role", "Warehouse"]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        to_table_row(
            self,
            &["/id", "/full_name", "/employee_id", "/role", "/warehouse_id"],
        )
    }
}
