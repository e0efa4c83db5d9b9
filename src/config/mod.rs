//! Configuration for redraft
//!
//! Two layers: the global config file (explicit path, workspace
//! `.redraft.yml`, or `~/.config/redraft/redraft.yml`) and per-episode agent
//! overrides carried in the workspace's episode.yaml.

pub use self::agent::{AgentCliBundle, AgentCliConfig, AgentOverride, AgentOverrides};
pub use self::settings::RedraftConfig;

mod agent;
mod settings;

/// Default iteration cap per review loop
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Assets whose published selection is locked unless configured otherwise
pub const DEFAULT_LOCKED_ASSETS: [&str; 4] =
    ["slug", "title_seo", "title_detail", "subtitle_auphonic"];
