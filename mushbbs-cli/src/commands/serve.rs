//! HTTP server command
//!
//! Flags override the configuration file, which overrides the defaults.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use mushbbs_core::BbsConfig;
use mushbbs_server::db::migrations;
use mushbbs_server::{connect, run_server, AppState, PgStore, PoolSettings, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default from config: 127.0.0.1:3030)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations before serving
    #[arg(long)]
    pub migrate: bool,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, mut config: BbsConfig) -> Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    config.server.cors_permissive |= args.cors_permissive;

    let database_url = args
        .database_url
        .or_else(|| config.server.database_url.clone())
        .context("DATABASE_URL not set. Set via --database-url, DATABASE_URL env, or ~/.mushbbs/config.toml")?;

    tracing::info!(
        bind = %config.server.bind,
        board_admin_threshold = config.access.board_admin_threshold,
        faction_admin_threshold = config.access.faction_admin_threshold,
        "starting mushbbs server"
    );

    let pool = connect(&database_url, PoolSettings::from(&config.server))
        .await
        .context("Failed to create database pool")?;

    if args.migrate {
        migrations::run(&pool).await.context("Migration failed")?;
    }

    let state = AppState::with_store(Arc::new(PgStore::new(pool.clone())), config.access)
        .with_database(pool);

    // Blocks until shutdown
    run_server(Arc::new(state), ServerConfig::from(&config.server))
        .await
        .context("Server error")?;

    Ok(())
}
