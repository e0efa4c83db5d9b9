//! Subprocess-backed capabilities
//!
//! Adapts an external agent CLI to the [`Creator`]/[`Reviewer`] traits. The
//! capability input is serialized to JSON and piped to the tool on stdin; the
//! tool answers with JSON on stdout, possibly surrounded by banner text. A
//! non-zero exit or empty output is a capability failure for the run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::capability::reply::{CreatorReply, ReviewerReply};
use crate::capability::traits::{Creator, Reviewer};
use crate::config::AgentCliConfig;
use crate::domain::{Candidate, CreatorInput, CreatorOutput, ReviewIssue, ReviewIteration, ReviewerInput};
use crate::error::{RedraftError, Result};
use crate::id::{generate_candidate_id, generate_issue_id};

/// Slice of `raw` from the first `{` to the last `}`, if both exist
///
/// Agent CLIs tend to print banners around their JSON.
pub fn extract_json_payload(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn capability_error(role: &str, asset_id: &str, iteration: u32, detail: String) -> RedraftError {
    RedraftError::Capability {
        role: role.to_string(),
        asset_id: asset_id.to_string(),
        iteration,
        detail,
    }
}

/// Run the configured command with `prompt` on stdin, return trimmed-checked stdout
async fn run_agent(
    config: &AgentCliConfig,
    root: &Path,
    prompt: &str,
    role: &str,
    asset_id: &str,
    iteration: u32,
) -> Result<String> {
    debug!(
        "running {} agent for '{}' iteration {}: {} {:?}",
        role, asset_id, iteration, config.command, config.args
    );
    let mut child = Command::new(&config.command)
        .args(&config.args)
        .current_dir(root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            capability_error(
                role,
                asset_id,
                iteration,
                format!("failed to spawn '{}': {}", config.command, e),
            )
        })?;

    // Feed the prompt concurrently with output collection; a child that
    // fills its stdout pipe before reading stdin blocks a sequential write.
    let stdin = child.stdin.take();
    let feed = async move {
        if let Some(mut pipe) = stdin {
            pipe.write_all(prompt.as_bytes()).await?;
            pipe.shutdown().await?;
        }
        Ok::<(), std::io::Error>(())
    };
    let (fed, waited) = tokio::join!(feed, child.wait_with_output());

    let output = waited.map_err(|e| {
        capability_error(
            role,
            asset_id,
            iteration,
            format!("failed to wait for '{}': {}", config.command, e),
        )
    })?;
    // A child may exit without consuming the whole prompt
    if let Err(e) = fed {
        if e.kind() != ErrorKind::BrokenPipe {
            return Err(capability_error(
                role,
                asset_id,
                iteration,
                format!("failed to write prompt to '{}': {}", config.command, e),
            ));
        }
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(capability_error(
            role,
            asset_id,
            iteration,
            format!(
                "'{}' exited with {}: {}",
                config.command,
                output.status,
                stderr.trim()
            ),
        ));
    }
    if stdout.trim().is_empty() {
        return Err(capability_error(
            role,
            asset_id,
            iteration,
            format!("'{}' produced no output", config.command),
        ));
    }
    Ok(stdout)
}

fn parse_payload(raw: &str, role: &str, asset_id: &str, iteration: u32) -> Result<Value> {
    let slice = extract_json_payload(raw).ok_or_else(|| {
        capability_error(
            role,
            asset_id,
            iteration,
            "no JSON object found in agent output".to_string(),
        )
    })?;
    serde_json::from_str(slice).map_err(|e| {
        capability_error(
            role,
            asset_id,
            iteration,
            format!("agent output is not valid JSON: {}", e),
        )
    })
}

/// Accept `{"candidate": {...}, ...}` or a bare candidate object
fn unwrap_creator_payload(value: Value) -> Value {
    if value.get("candidate").is_some() {
        return value;
    }
    if value.get("content").is_some() {
        let mut wrapped = serde_json::Map::new();
        wrapped.insert("candidate".to_string(), value);
        return Value::Object(wrapped);
    }
    value
}

/// Accept `{"review": {...}}` or a bare review object
fn unwrap_reviewer_payload(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("review") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Creator backed by an external agent CLI
pub struct CliCreator {
    config: AgentCliConfig,
    root: PathBuf,
}

impl CliCreator {
    pub fn new(config: AgentCliConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }
}

#[async_trait]
impl Creator for CliCreator {
    async fn produce(&self, input: &CreatorInput) -> Result<CreatorOutput> {
        let prompt = serde_json::to_string_pretty(input)?;
        let stdout = run_agent(
            &self.config,
            &self.root,
            &prompt,
            "creator",
            &input.asset_id,
            input.iteration,
        )
        .await?;
        let payload = parse_payload(&stdout, "creator", &input.asset_id, input.iteration)?;
        let parsed: CreatorReply = serde_json::from_value(unwrap_creator_payload(payload))
            .map_err(|e| {
                capability_error(
                    "creator",
                    &input.asset_id,
                    input.iteration,
                    format!("invalid creator reply: {}", e),
                )
            })?;
        let block = parsed.candidate.ok_or_else(|| {
            capability_error(
                "creator",
                &input.asset_id,
                input.iteration,
                "creator reply has no candidate".to_string(),
            )
        })?;
        let content = block.content.ok_or_else(|| {
            capability_error(
                "creator",
                &input.asset_id,
                input.iteration,
                "candidate reply has no content".to_string(),
            )
        })?;

        let candidate = Candidate {
            asset_id: block.asset_id.unwrap_or_else(|| input.asset_id.clone()),
            candidate_id: block.candidate_id.unwrap_or_else(generate_candidate_id),
            content,
            format: block.format.unwrap_or_default(),
            created_at: block.created_at.unwrap_or_else(Utc::now),
            provenance: block.provenance.unwrap_or_default(),
        };
        Ok(CreatorOutput {
            candidate,
            done: parsed.done.unwrap_or(false),
            applied: parsed.applied.unwrap_or(true),
        })
    }
}

/// Reviewer backed by an external agent CLI
pub struct CliReviewer {
    config: AgentCliConfig,
    root: PathBuf,
}

impl CliReviewer {
    pub fn new(config: AgentCliConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }
}

#[async_trait]
impl Reviewer for CliReviewer {
    async fn review(
        &self,
        _candidate: &Candidate,
        input: &ReviewerInput,
    ) -> Result<ReviewIteration> {
        let prompt = serde_json::to_string_pretty(input)?;
        let stdout = run_agent(
            &self.config,
            &self.root,
            &prompt,
            "reviewer",
            &input.asset_id,
            input.iteration,
        )
        .await?;
        let payload = parse_payload(&stdout, "reviewer", &input.asset_id, input.iteration)?;
        let parsed: ReviewerReply = serde_json::from_value(unwrap_reviewer_payload(payload))
            .map_err(|e| {
                capability_error(
                    "reviewer",
                    &input.asset_id,
                    input.iteration,
                    format!("invalid reviewer reply: {}", e),
                )
            })?;
        let verdict = parsed.verdict.ok_or_else(|| {
            capability_error(
                "reviewer",
                &input.asset_id,
                input.iteration,
                "reviewer reply has no verdict".to_string(),
            )
        })?;

        let issues = parsed
            .issues
            .into_iter()
            .map(|issue| ReviewIssue {
                issue_id: issue.issue_id.unwrap_or_else(generate_issue_id),
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
            reviewer: parsed.reviewer.or_else(|| Some(self.config.role.clone())),
            created_at: parsed.created_at.unwrap_or_else(Utc::now),
            summary: parsed.summary,
            provenance: vec![],
        })
    }
}
