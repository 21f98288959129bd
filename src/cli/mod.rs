//! Command-line interface for the Aforo client.
//!
//! Subcommands:
//! - `login <email>` - Sign in and persist the session
//! - `logout` - Drop the persisted session
//! - `whoami` - Show the currently signed-in user
//! - `buildings show [id]` - Show a building record

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::{auth, buildings};
use crate::config::Config;
use crate::session::Navigator;
use crate::AppContext;

#[derive(Parser, Debug)]
#[command(name = "aforo")]
#[command(author, version, about = "Command-line client for the Aforo building-management API", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "aforo.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API base URL, overriding the config file
    #[arg(long, env = "AFORO_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and persist the session
    Login {
        /// Account email
        email: String,
        /// Account password (can also be set via AFORO_PASSWORD)
        #[arg(long, env = "AFORO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Drop the persisted session
    Logout,

    /// Show the currently signed-in user
    Whoami,

    /// Building commands
    #[command(subcommand)]
    Buildings(BuildingsCommands),
}

#[derive(Subcommand, Debug)]
pub enum BuildingsCommands {
    /// Show a building record
    Show {
        /// Building id; defaults to the building assigned to the session
        id: Option<i64>,
    },
}

/// Navigation surface for a CLI: "redirecting to the login view" degrades to
/// a hint on stderr, since the next login is a separate process run. During
/// the `login` command the login view counts as already active.
struct CliNavigator {
    at_login: AtomicBool,
}

impl Navigator for CliNavigator {
    fn at_login(&self) -> bool {
        self.at_login.load(Ordering::SeqCst)
    }

    fn goto_login(&self) {
        eprintln!("Session expired. Run `aforo login` to sign in again.");
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, mut config: Config) -> Result<()> {
    if let Some(api_url) = &cli.api_url {
        config.api.base_url = api_url.clone();
    }

    let navigator = Arc::new(CliNavigator {
        at_login: AtomicBool::new(matches!(cli.command, Commands::Login { .. })),
    });
    let ctx = AppContext::new(config, navigator)?;
    ctx.session.initialize();

    match &cli.command {
        Commands::Login { email, password } => cmd_login(&ctx, email, password).await,
        Commands::Logout => cmd_logout(&ctx),
        Commands::Whoami => cmd_whoami(&ctx),
        Commands::Buildings(BuildingsCommands::Show { id }) => {
            cmd_buildings_show(&ctx, *id).await
        }
    }
}

async fn cmd_login(ctx: &AppContext, email: &str, password: &str) -> Result<()> {
    let response = auth::login(&ctx.api, email, password).await?;
    ctx.session.login(
        response.session(),
        &response.token,
        response.refresh_token.as_deref(),
    );

    let user = ctx.session.current().context("Session missing after login")?;
    println!("Signed in as {} <{}> [{}]", user.name, user.email, user.role.as_str());
    match user.building_id {
        Some(building_id) => println!("Assigned building: {}", building_id),
        None => println!("No building assigned to this account"),
    }
    Ok(())
}

fn cmd_logout(ctx: &AppContext) -> Result<()> {
    ctx.session.logout();
    println!("Signed out");
    Ok(())
}

fn cmd_whoami(ctx: &AppContext) -> Result<()> {
    let Some(user) = ctx.session.current() else {
        bail!("Not signed in. Run `aforo login` first.");
    };
    println!("{} <{}>", user.name, user.email);
    println!("Role:     {}", user.role.as_str());
    match user.building_id {
        Some(building_id) => println!("Building: {}", building_id),
        None => println!("Building: none"),
    }
    Ok(())
}

async fn cmd_buildings_show(ctx: &AppContext, id: Option<i64>) -> Result<()> {
    if !ctx.session.is_authenticated() {
        bail!("Not signed in. Run `aforo login` first.");
    }
    let id = match id.or_else(|| ctx.session.current().and_then(|user| user.building_id)) {
        Some(id) => id,
        None => bail!("No building assigned to this account; pass an id explicitly."),
    };

    let building = buildings::get_building(&ctx.api, id).await?;

    println!();
    println!("=== {} ===", building.name);
    println!();
    println!("Id:            {}", building.id);
    println!("Address:       {}", building.address);
    println!("Description:   {}", building.description);
    println!("Total units:   {}", building.total_units);
    println!(
        "Administrator: {} (user {})",
        building.admin_name, building.admin_user_id
    );
    println!("Updated:       {}", building.updated_at.to_rfc3339());
    println!();
    Ok(())
}
