//! Candidate model
//!
//! A Candidate is one drafted version of an asset's content. Candidates are
//! produced by the Creator capability, one per iteration, and are immutable
//! once written: later iterations reference them but never modify them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text format of a candidate's content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Markdown,
    Plain,
    Html,
}

impl ContentFormat {
    /// File extension used when the content is written as a text file
    pub fn extension(&self) -> &'static str {
        match self {
            ContentFormat::Markdown => "md",
            ContentFormat::Plain => "txt",
            ContentFormat::Html => "html",
        }
    }
}

/// Where a piece of content came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    /// Source kind, e.g. "transcript", "agent", "seed"
    pub kind: String,

    /// Reference into the source (path, id, tool name)
    #[serde(rename = "ref")]
    pub reference: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// One drafted version of an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Asset this candidate drafts, e.g. "description" or "shownotes"
    pub asset_id: String,

    pub candidate_id: Uuid,

    /// The drafted text itself
    pub content: String,

    #[serde(default)]
    pub format: ContentFormat,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub provenance: Vec<ProvenanceEntry>,
}

/// Check an asset identifier against the `^[a-z][a-z0-9_]*$` pattern
pub fn is_valid_asset_id(asset_id: &str) -> bool {
    let mut chars = asset_id.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
