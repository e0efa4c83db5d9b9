//! Path scheme for the episode workspace
//!
//! ```text
//! <root>/episode.yaml
//! <root>/copy/candidates/<asset>/candidate_<uuid>.json   envelope
//! <root>/copy/candidates/<asset>/candidate_<uuid>.<ext>  raw text
//! <root>/copy/reviews/<asset>/iteration_NN[.<reviewer>].json
//! <root>/copy/selected/<asset>.<ext>
//! <root>/copy/protocol/<asset>/iteration_NN.json
//! <root>/copy/protocol/<asset>/state.json
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::domain::ContentFormat;

/// Flatten a raw name into a segment safe to place in a path
pub fn safe_path_segment(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn episode_meta_path(&self) -> PathBuf {
        self.root.join("episode.yaml")
    }

    pub fn candidates_dir(&self, asset_id: &str) -> PathBuf {
        self.root
            .join("copy")
            .join("candidates")
            .join(safe_path_segment(asset_id))
    }

    pub fn candidate_envelope_path(&self, asset_id: &str, candidate_id: Uuid) -> PathBuf {
        self.candidates_dir(asset_id)
            .join(format!("candidate_{candidate_id}.json"))
    }

    pub fn candidate_text_path(
        &self,
        asset_id: &str,
        candidate_id: Uuid,
        format: ContentFormat,
    ) -> PathBuf {
        self.candidates_dir(asset_id)
            .join(format!("candidate_{candidate_id}.{}", format.extension()))
    }

    pub fn reviews_dir(&self, asset_id: &str) -> PathBuf {
        self.root
            .join("copy")
            .join("reviews")
            .join(safe_path_segment(asset_id))
    }

    pub fn review_path(&self, asset_id: &str, iteration: u32, reviewer: Option<&str>) -> PathBuf {
        let name = match reviewer {
            Some(label) => format!("iteration_{:02}.{}.json", iteration, safe_path_segment(label)),
            None => format!("iteration_{iteration:02}.json"),
        };
        self.reviews_dir(asset_id).join(name)
    }

    pub fn selected_path(&self, asset_id: &str, format: ContentFormat) -> PathBuf {
        self.root.join("copy").join("selected").join(format!(
            "{}.{}",
            safe_path_segment(asset_id),
            format.extension()
        ))
    }

    pub fn protocol_dir(&self, asset_id: &str) -> PathBuf {
        self.root
            .join("copy")
            .join("protocol")
            .join(safe_path_segment(asset_id))
    }

    pub fn protocol_iteration_path(&self, asset_id: &str, iteration: u32) -> PathBuf {
        self.protocol_dir(asset_id)
            .join(format!("iteration_{iteration:02}.json"))
    }

    pub fn protocol_state_path(&self, asset_id: &str) -> PathBuf {
        self.protocol_dir(asset_id).join("state.json")
    }
}
