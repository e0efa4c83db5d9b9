//! Agent command configuration
//!
//! Which CLI commands play Creator and Reviewer. The global config sets the
//! baseline and an episode.yaml may override either role per field.

use eyre::{Result, bail};
use serde::{Deserialize, Serialize};

/// How to invoke one CLI agent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentCliConfig {
    pub role: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl AgentCliConfig {
    pub fn new(role: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Partial override for one agent role
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl AgentOverride {
    pub fn is_empty(&self) -> bool {
        self.command.is_none() && self.args.is_none()
    }
}

/// The `agents:` section of a config or episode file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<AgentOverride>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<AgentOverride>,
}

/// The resolved Creator/Reviewer command pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentCliBundle {
    pub creator: AgentCliConfig,
    pub reviewer: AgentCliConfig,
}

impl Default for AgentCliBundle {
    fn default() -> Self {
        Self {
            creator: AgentCliConfig::new("creator", "codex"),
            reviewer: AgentCliConfig::new("reviewer", "claude"),
        }
    }
}

impl AgentCliBundle {
    /// Apply per-field overrides, the override layer winning
    pub fn with_overrides(mut self, overrides: &AgentOverrides) -> Self {
        if let Some(role) = &overrides.creator {
            apply_role(&mut self.creator, role);
        }
        if let Some(role) = &overrides.reviewer {
            apply_role(&mut self.reviewer, role);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        for config in [&self.creator, &self.reviewer] {
            if config.command.trim().is_empty() {
                bail!("agents.{}.command must be a non-empty string", config.role);
            }
            if config.command.chars().any(char::is_whitespace) {
                bail!(
                    "agents.{}.command must not contain whitespace; use agents.{}.args",
                    config.role,
                    config.role
                );
            }
        }
        Ok(())
    }
}

fn apply_role(config: &mut AgentCliConfig, role: &AgentOverride) {
    if let Some(command) = &role.command {
        config.command = command.clone();
    }
    if let Some(args) = &role.args {
        config.args = args.clone();
    }
}
