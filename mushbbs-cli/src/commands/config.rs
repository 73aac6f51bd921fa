//! Configuration inspection

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use mushbbs_core::BbsConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (file + environment) as TOML
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run_config(args: ConfigArgs, path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(BbsConfig::config_path);

    match args.command {
        ConfigCommand::Show => {
            let config = if path.exists() {
                BbsConfig::load(Some(&path))?
            } else {
                let mut config = BbsConfig::default();
                config.apply_overrides(|key| std::env::var(key).ok())?;
                config
            };
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{rendered}");
        }
        ConfigCommand::Path => println!("{}", path.display()),
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            BbsConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
