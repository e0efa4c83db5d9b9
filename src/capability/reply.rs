//! Wire shapes for agent replies
//!
//! Agents answer with JSON. Every field that the data model can derive is
//! optional here; each capability fills the gaps with its own defaults
//! (scripted fixtures use deterministic ids and a fixed epoch, subprocess
//! capabilities use fresh ids and the current time).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{ContentFormat, IssueSeverity, ProvenanceEntry, ReviewVerdict};

/// Candidate block of a creator reply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateReply {
    #[serde(default)]
    pub asset_id: Option<String>,

    #[serde(default)]
    pub candidate_id: Option<Uuid>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub format: Option<ContentFormat>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub provenance: Option<Vec<ProvenanceEntry>>,
}

/// Full creator reply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatorReply {
    #[serde(default)]
    pub done: Option<bool>,

    #[serde(default)]
    pub applied: Option<bool>,

    #[serde(default)]
    pub candidate: Option<CandidateReply>,
}

/// One issue inside a reviewer reply
#[derive(Debug, Clone, Deserialize)]
pub struct IssueReply {
    pub message: String,

    #[serde(default)]
    pub issue_id: Option<Uuid>,

    #[serde(default)]
    pub severity: Option<IssueSeverity>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub field: Option<String>,
}

/// Full reviewer reply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewerReply {
    #[serde(default)]
    pub verdict: Option<ReviewVerdict>,

    #[serde(default)]
    pub issues: Vec<IssueReply>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub reviewer: Option<String>,

    #[serde(default)]
    pub iteration: Option<u32>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
