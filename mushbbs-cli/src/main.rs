//! mushbbs CLI - bulletin board server for MUSH games
//!
//! Subcommands:
//! - `serve`: run the HTTP API and notification stream
//! - `migrate`: create or update the database schema
//! - `check-lock`: parse and try out a lock expression
//! - `config`: show or initialize the configuration file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mushbbs_core::BbsConfig;

mod commands;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "mushbbs",
    author,
    version,
    about = "Faction-aware bulletin boards for MUSH games",
    long_about = "Serve boards and posts over HTTP with lock-based access control, \
                  anonymous boards and live notifications to connected characters."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.mushbbs/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(commands::serve::ServeArgs),
    /// Run database migrations
    Migrate(commands::migrate::MigrateArgs),
    /// Parse a lock expression and optionally evaluate it
    CheckLock(commands::lock::CheckLockArgs),
    /// Show or initialize configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args, load_config(&cli.config)?).await?,
        Commands::Migrate(args) => commands::run_migrate(args, load_config(&cli.config)?).await?,
        Commands::CheckLock(args) => commands::run_check_lock(args)?,
        Commands::Config(args) => commands::run_config(args, cli.config.as_deref())?,
    }
    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<BbsConfig> {
    BbsConfig::load(path.as_deref()).context("failed to load configuration")
}
