//! Database migration command

use anyhow::{Context, Result};
use clap::Parser;

use mushbbs_core::BbsConfig;
use mushbbs_server::create_pool;
use mushbbs_server::db::migrations;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long)]
    pub database_url: Option<String>,
}

pub async fn run_migrate(args: MigrateArgs, config: BbsConfig) -> Result<()> {
    let database_url = args
        .database_url
        .or(config.server.database_url)
        .context("DATABASE_URL not set. Set via --database-url, DATABASE_URL env, or ~/.mushbbs/config.toml")?;

    let pool = create_pool(&database_url)
        .await
        .context("Failed to create database pool")?;
    migrations::run(&pool).await.context("Migration failed")?;

    println!("Migrations complete");
    Ok(())
}
