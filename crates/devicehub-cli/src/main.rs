mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devicehub_config::{AppConfig, ConfigLoader};
use devicehub_db::Dialect;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devicehub", version, about = "Device table schema migrations")]
struct Cli {
    /// Path to config.yml (defaults to ~/.devicehub/config.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database holding the devices table; overrides the config file
    #[arg(short, long, global = true, env = "DEVICEHUB_DATABASE")]
    database: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Add the actuators, actuator_states and thresholds columns (default)
    Migrate,
    /// Print the ALTER TABLE statements without running them
    Plan {
        #[arg(long, default_value = "mysql")]
        dialect: Dialect,
    },
    /// Show which device columns already exist
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_dir(path.parent().unwrap_or(path.as_path())),
        None => ConfigLoader::new()?,
    };
    let config = match &cli.config {
        Some(path) => loader.load_from(path),
        None => loader.load(),
    }
    .context("failed to load configuration")?;

    init_tracing(&config, cli.verbose);

    let db_path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.database.resolve_path(loader.config_dir()));

    match cli.command.unwrap_or(Command::Migrate) {
        Command::Migrate => commands::migrate(&db_path),
        Command::Plan { dialect } => commands::plan(dialect),
        Command::Status => commands::status(&db_path),
    }
}

/// Logs go to stderr; stdout carries only status lines.
fn init_tracing(config: &AppConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { config.log.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
