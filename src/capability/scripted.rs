//! Scripted capabilities
//!
//! Fixture implementations of [`Creator`] and [`Reviewer`] that answer from a
//! finite list of canned JSON replies. Output is fully deterministic: ids are
//! derived with UUIDv5 and timestamps default to a fixed epoch, so repeated
//! runs produce identical protocol files. Used by tests and by the CLI's
//! `--fake-replies` mode.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::capability::reply::{CreatorReply, ReviewerReply};
use crate::capability::traits::{Creator, Reviewer};
use crate::domain::{Candidate, CreatorInput, CreatorOutput, ReviewIssue, ReviewIteration, ReviewerInput};
use crate::error::{RedraftError, Result};
use crate::id::deterministic_id;

// 2000-01-01T00:00:00Z
const FIXTURE_EPOCH_SECS: i64 = 946_684_800;

/// Timestamp used when a scripted reply omits `created_at`
pub fn fixture_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(FIXTURE_EPOCH_SECS, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// One canned reply: a JSON payload plus optional workspace mutations
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    payload: Value,
    mutate_files: BTreeMap<String, String>,
}

impl ScriptedReply {
    /// Build a reply from a JSON value
    ///
    /// Accepts an object (a `mutate_files` key, if present, is split off as
    /// workspace mutations) or a string holding raw JSON.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(raw) => Self::from_json(&raw),
            Value::Object(mut map) => {
                let mutate_files = match map.remove("mutate_files") {
                    None => BTreeMap::new(),
                    Some(v) => serde_json::from_value(v).map_err(|e| {
                        RedraftError::Config(format!("invalid mutate_files in scripted reply: {}", e))
                    })?,
                };
                Ok(Self {
                    payload: Value::Object(map),
                    mutate_files,
                })
            }
            other => Err(RedraftError::Config(format!(
                "scripted reply must be a JSON object or string, got: {}",
                other
            ))),
        }
    }

    /// Build a reply from a raw JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| RedraftError::Config(format!("invalid scripted reply JSON: {}", e)))?;
        Self::from_value(value)
    }
}

/// Reply script file: scripted replies for both roles
///
/// Loaded from YAML or JSON by the CLI's `--fake-replies` flag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyScript {
    #[serde(default)]
    pub creator: Vec<Value>,

    #[serde(default)]
    pub reviewer: Vec<Value>,

    #[serde(default)]
    pub reviewer_label: Option<String>,
}

impl ReplyScript {
    pub fn creator_replies(&self) -> Result<Vec<ScriptedReply>> {
        self.creator
            .iter()
            .cloned()
            .map(ScriptedReply::from_value)
            .collect()
    }

    pub fn reviewer_replies(&self) -> Result<Vec<ScriptedReply>> {
        self.reviewer
            .iter()
            .cloned()
            .map(ScriptedReply::from_value)
            .collect()
    }
}

/// Shared reply queue handling for both scripted roles
struct ReplyQueue {
    replies: Mutex<VecDeque<ScriptedReply>>,
    script_len: usize,
}

impl ReplyQueue {
    fn new(replies: Vec<ScriptedReply>) -> Self {
        let script_len = replies.len();
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            script_len,
        }
    }

    /// Pop the next reply, returning it with its 0-based call index
    async fn next(&self, role: &str, asset_id: &str, iteration: u32) -> Result<(ScriptedReply, usize)> {
        let mut queue = self.replies.lock().await;
        let index = self.script_len - queue.len();
        match queue.pop_front() {
            Some(reply) => Ok((reply, index)),
            None => Err(RedraftError::Capability {
                role: role.to_string(),
                asset_id: asset_id.to_string(),
                iteration,
                detail: format!("reply script exhausted after {} replies", self.script_len),
            }),
        }
    }
}

async fn write_mutations(
    root: Option<&Path>,
    files: &BTreeMap<String, String>,
) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    let root = root.ok_or_else(|| {
        RedraftError::Config("scripted reply carries mutate_files but no workspace root is set".to_string())
    })?;
    for (rel, content) in files {
        let rel_path = Path::new(rel);
        let escapes = rel_path.is_absolute()
            || rel_path
                .components()
                .any(|c| matches!(c, Component::ParentDir));
        if escapes {
            return Err(RedraftError::Store(format!(
                "mutation path '{}' escapes the workspace",
                rel
            )));
        }
        let target = root.join(rel_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut text = content.clone();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        tokio::fs::write(&target, text).await?;
    }
    Ok(())
}

/// Creator that answers from a canned reply script
pub struct ScriptedCreator {
    queue: ReplyQueue,
    root: Option<PathBuf>,
}

impl ScriptedCreator {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            queue: ReplyQueue::new(replies),
            root: None,
        }
    }

    /// Workspace root for `mutate_files` side effects
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

#[async_trait]
impl Creator for ScriptedCreator {
    async fn produce(&self, input: &CreatorInput) -> Result<CreatorOutput> {
        let (reply, index) = self
            .queue
            .next("creator", &input.asset_id, input.iteration)
            .await?;
        write_mutations(self.root.as_deref(), &reply.mutate_files).await?;

        let parsed: CreatorReply =
            serde_json::from_value(reply.payload).map_err(|e| RedraftError::Capability {
                role: "creator".to_string(),
                asset_id: input.asset_id.clone(),
                iteration: input.iteration,
                detail: format!("invalid creator reply: {}", e),
            })?;
        let block = parsed.candidate.ok_or_else(|| RedraftError::Capability {
            role: "creator".to_string(),
            asset_id: input.asset_id.clone(),
            iteration: input.iteration,
            detail: "creator reply has no candidate".to_string(),
        })?;
        let content = block.content.ok_or_else(|| RedraftError::Capability {
            role: "creator".to_string(),
            asset_id: input.asset_id.clone(),
            iteration: input.iteration,
            detail: "candidate reply has no content".to_string(),
        })?;

        let candidate = Candidate {
            asset_id: block.asset_id.unwrap_or_else(|| input.asset_id.clone()),
            candidate_id: block.candidate_id.unwrap_or_else(|| {
                deterministic_id(
                    "candidate",
                    &[
                        &input.asset_id,
                        &input.iteration.to_string(),
                        &index.to_string(),
                    ],
                )
            }),
            content,
            format: block.format.unwrap_or_default(),
            created_at: block.created_at.unwrap_or_else(fixture_epoch),
            provenance: block.provenance.unwrap_or_default(),
        };
        Ok(CreatorOutput {
            candidate,
            done: parsed.done.unwrap_or(false),
            applied: parsed.applied.unwrap_or(true),
        })
    }
}

/// Reviewer that answers from a canned reply script
pub struct ScriptedReviewer {
    queue: ReplyQueue,
    label: String,
    root: Option<PathBuf>,
}

impl ScriptedReviewer {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            queue: ReplyQueue::new(replies),
            label: "reviewer".to_string(),
            root: None,
        }
    }

    /// Reviewer label recorded when a reply omits one
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn review(
        &self,
        _candidate: &Candidate,
        input: &ReviewerInput,
    ) -> Result<ReviewIteration> {
        let (reply, _index) = self
            .queue
            .next("reviewer", &input.asset_id, input.iteration)
            .await?;
        write_mutations(self.root.as_deref(), &reply.mutate_files).await?;

        let parsed: ReviewerReply =
            serde_json::from_value(reply.payload).map_err(|e| RedraftError::Capability {
                role: "reviewer".to_string(),
                asset_id: input.asset_id.clone(),
                iteration: input.iteration,
                detail: format!("invalid reviewer reply: {}", e),
            })?;
        let verdict = parsed.verdict.ok_or_else(|| RedraftError::Capability {
            role: "reviewer".to_string(),
            asset_id: input.asset_id.clone(),
            iteration: input.iteration,
            detail: "reviewer reply has no verdict".to_string(),
        })?;

        let issues = parsed
            .issues
            .into_iter()
            .enumerate()
            .map(|(i, issue)| ReviewIssue {
                issue_id: issue.issue_id.unwrap_or_else(|| {
                    deterministic_id(
                        "review_issue",
                        &[
                            &input.asset_id,
                            &input.iteration.to_string(),
                            &i.to_string(),
                        ],
                    )
                }),
                message: issue.message,
                severity: issue.severity.unwrap_or_default(),
                code: issue.code,
                field: issue.field,
            })
            .collect();

        Ok(ReviewIteration {
            iteration: parsed.iteration.unwrap_or(input.iteration),
            verdict,
            issues,
            reviewer: parsed.reviewer.or_else(|| Some(self.label.clone())),
            created_at: parsed.created_at.unwrap_or_else(fixture_epoch),
            summary: parsed.summary,
            provenance: vec![],
        })
    }
}
