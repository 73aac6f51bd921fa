use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::access::AccessConfig;

/// Configuration for the mushbbs server and CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BbsConfig {
    pub server: ServerSection,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: SocketAddr,
    pub cors_permissive: bool,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
            database_url: None,
            max_connections: 10,
        }
    }
}

impl BbsConfig {
    /// Load from `path`, or from ~/.mushbbs/config.toml when present, then
    /// apply environment overrides. Missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&content).context("Failed to parse config file (invalid TOML)")
    }

    /// Get config file path: ~/.mushbbs/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mushbbs/config.toml")
    }

    /// Apply `MUSHBBS_*` / `DATABASE_URL` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("MUSHBBS_BIND") {
            self.server.bind = bind
                .parse()
                .context(format!("Invalid MUSHBBS_BIND address: {bind}"))?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.server.database_url = Some(url);
        }
        if let Some(level) = lookup("MUSHBBS_BOARD_ADMIN_THRESHOLD") {
            self.access.board_admin_threshold = level
                .parse()
                .context("MUSHBBS_BOARD_ADMIN_THRESHOLD must be an integer")?;
        }
        if let Some(level) = lookup("MUSHBBS_FACTION_ADMIN_THRESHOLD") {
            self.access.faction_admin_threshold = level
                .parse()
                .context("MUSHBBS_FACTION_ADMIN_THRESHOLD must be an integer")?;
        }
        Ok(())
    }

    /// Save config to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, toml_str).context(format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}
