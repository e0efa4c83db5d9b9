//! Global configuration
//!
//! Loaded from an explicit path, `.redraft.yml` in the workspace root, or
//! `~/.config/redraft/redraft.yml`, in that order.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use eyre::{Context, Result, bail};
use serde::Deserialize;

use crate::config::{AgentCliBundle, AgentOverrides, DEFAULT_LOCKED_ASSETS, DEFAULT_MAX_ITERATIONS};
use crate::domain::is_valid_asset_id;

/// On-disk shape of the config file; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
struct RedraftConfigFile {
    max_iterations: Option<u32>,
    locked_assets: Option<Vec<String>>,
    agents: Option<AgentOverrides>,
}

/// Resolved configuration for a run
#[derive(Debug, Clone, PartialEq)]
pub struct RedraftConfig {
    /// Iteration cap for every loop unless the CLI overrides it
    pub max_iterations: u32,

    /// Assets whose published selection must not drift
    pub locked_assets: BTreeSet<String>,

    /// Creator/Reviewer command pair
    pub agents: AgentCliBundle,
}

impl Default for RedraftConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            locked_assets: DEFAULT_LOCKED_ASSETS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            agents: AgentCliBundle::default(),
        }
    }
}

impl RedraftConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .redraft.yml in the workspace root
    /// 3. ~/.config/redraft/redraft.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&Path>, workspace_root: &Path) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()));
        }

        let project_config = workspace_root.join(".redraft.yml");
        if project_config.exists() {
            log::info!("loading config from {}", project_config.display());
            return Self::load_from_file(&project_config)
                .with_context(|| format!("failed to load config from {}", project_config.display()));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("redraft").join("redraft.yml");
            if user_config.exists() {
                log::info!("loading config from {}", user_config.display());
                return Self::load_from_file(&user_config)
                    .with_context(|| format!("failed to load config from {}", user_config.display()));
            }
        }

        log::info!("no config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        let file: RedraftConfigFile =
            serde_yaml::from_str(&content).context("failed to parse config file")?;
        let config = Self::resolve(file);
        config.validate()?;
        Ok(config)
    }

    fn resolve(file: RedraftConfigFile) -> Self {
        let defaults = Self::default();
        let agents = match file.agents {
            Some(overrides) => defaults.agents.with_overrides(&overrides),
            None => defaults.agents,
        };
        Self {
            max_iterations: file.max_iterations.unwrap_or(defaults.max_iterations),
            locked_assets: file
                .locked_assets
                .map(|assets| assets.into_iter().collect())
                .unwrap_or(defaults.locked_assets),
            agents,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            bail!("max_iterations must be at least 1");
        }
        for asset in &self.locked_assets {
            if !is_valid_asset_id(asset) {
                bail!("locked_assets entry '{}' is not a valid asset id", asset);
            }
        }
        self.agents.validate()?;
        Ok(())
    }
}
