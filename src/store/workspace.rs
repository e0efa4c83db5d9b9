//! Filesystem store over an episode workspace
//!
//! Every write is atomic: the payload lands in a temporary file next to the
//! destination, gets flushed and synced, then renamed into place. JSON
//! documents are pretty-printed with sorted keys and end with a newline so
//! reruns produce byte-identical files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::capability::SelectionLookup;
use crate::config::AgentOverrides;
use crate::domain::{
    Candidate, ContentFormat, LoopProtocolIteration, LoopProtocolState, ReviewIteration,
};
use crate::error::{RedraftError, Result};
use crate::store::layout::WorkspaceLayout;
use crate::store::traits::ProtocolStore;

/// Episode context read from `<root>/episode.yaml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EpisodeMeta {
    pub host_names: Vec<String>,
    pub episode_summary: Option<String>,
    pub chapters: Option<String>,
    pub agents: Option<AgentOverrides>,
}

pub struct WorkspaceStore {
    layout: WorkspaceLayout,
}

impl WorkspaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: WorkspaceLayout::new(root),
        }
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Episode metadata, defaulting to empty when the file does not exist
    pub async fn read_episode_meta(&self) -> Result<EpisodeMeta> {
        let path = self.layout.episode_meta_path();
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(EpisodeMeta::default()),
            Err(e) => return Err(e.into()),
        };
        serde_yaml::from_str(&text).map_err(|e| {
            RedraftError::Store(format!("invalid YAML at {}: {e}", path.display()))
        })
    }
}

fn to_sorted_json<T: Serialize>(value: &T) -> Result<String> {
    // Value maps are BTree-backed, so keys come out sorted
    let tree = serde_json::to_value(value)?;
    let mut text = serde_json::to_string_pretty(&tree)?;
    text.push('\n');
    Ok(text)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&text) {
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(RedraftError::Store(format!(
            "invalid JSON at {}: {e}",
            path.display()
        ))),
    }
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        RedraftError::Store(format!("no parent directory for {}", path.display()))
    })?;
    fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("file");
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let outcome = write_and_rename(&tmp, path, bytes).await;
    if outcome.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    outcome
}

async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, path).await?;

    // Directory sync is best effort; some filesystems refuse it
    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[async_trait]
impl ProtocolStore for WorkspaceStore {
    async fn load_protocol_state(&self, asset_id: &str) -> Result<Option<LoopProtocolState>> {
        read_json(&self.layout.protocol_state_path(asset_id)).await
    }

    async fn write_protocol_iteration(
        &self,
        asset_id: &str,
        entry: &LoopProtocolIteration,
    ) -> Result<()> {
        let path = self.layout.protocol_iteration_path(asset_id, entry.iteration);
        atomic_write(&path, to_sorted_json(entry)?.as_bytes()).await
    }

    async fn write_protocol_state(&self, state: &LoopProtocolState) -> Result<()> {
        let path = self.layout.protocol_state_path(&state.asset_id);
        atomic_write(&path, to_sorted_json(state)?.as_bytes()).await
    }

    async fn write_candidate(&self, candidate: &Candidate) -> Result<()> {
        let envelope = self
            .layout
            .candidate_envelope_path(&candidate.asset_id, candidate.candidate_id);
        atomic_write(&envelope, to_sorted_json(candidate)?.as_bytes()).await?;

        let text = self.layout.candidate_text_path(
            &candidate.asset_id,
            candidate.candidate_id,
            candidate.format,
        );
        atomic_write(&text, candidate.content.as_bytes()).await
    }

    async fn write_review(&self, asset_id: &str, review: &ReviewIteration) -> Result<()> {
        let path = self
            .layout
            .review_path(asset_id, review.iteration, review.reviewer.as_deref());
        atomic_write(&path, to_sorted_json(review)?.as_bytes()).await
    }

    async fn write_selected_text(
        &self,
        asset_id: &str,
        format: ContentFormat,
        content: &str,
    ) -> Result<()> {
        let path = self.layout.selected_path(asset_id, format);
        let mut text = content.to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        atomic_write(&path, text.as_bytes()).await
    }

    async fn latest_seed_candidate(&self, asset_id: &str) -> Result<Option<Candidate>> {
        let dir = self.layout.candidates_dir(asset_id);
        let pattern = format!("{}/candidate_*.json", dir.display());
        let paths = glob::glob(&pattern)
            .map_err(|e| RedraftError::Store(format!("bad glob pattern '{pattern}': {e}")))?;

        let mut newest: Option<Candidate> = None;
        for entry in paths {
            let path = entry
                .map_err(|e| RedraftError::Store(format!("unreadable candidate file: {e}")))?;
            let Some(candidate) = read_json::<Candidate>(&path).await? else {
                continue;
            };
            if candidate.asset_id != asset_id {
                return Err(RedraftError::Store(format!(
                    "candidate asset_id mismatch at {}",
                    path.display()
                )));
            }
            let newer = match &newest {
                Some(current) => {
                    (candidate.created_at, candidate.candidate_id)
                        > (current.created_at, current.candidate_id)
                }
                None => true,
            };
            if newer {
                newest = Some(candidate);
            }
        }

        if let Some(candidate) = &newest {
            debug!(
                "seed candidate for '{}' is {}",
                asset_id, candidate.candidate_id
            );
        }
        Ok(newest)
    }
}

#[async_trait]
impl SelectionLookup for WorkspaceStore {
    async fn selected_content(&self, asset_id: &str) -> Result<Option<String>> {
        for format in [
            ContentFormat::Markdown,
            ContentFormat::Plain,
            ContentFormat::Html,
        ] {
            let path = self.layout.selected_path(asset_id, format);
            match fs::read_to_string(&path).await {
                Ok(text) => return Ok(Some(text)),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}
