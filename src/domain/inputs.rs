//! Capability request/response objects
//!
//! Ephemeral per-call shapes passed across the Creator/Reviewer boundary.
//! They are serialized as the prompt payload for subprocess capabilities but
//! are never persisted.

use serde::{Deserialize, Serialize};

use crate::domain::candidate::Candidate;
use crate::domain::review::ReviewIteration;

/// Request for one Creator call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorInput {
    pub asset_id: String,

    /// Candidate from the previous iteration, if any
    #[serde(default)]
    pub previous_candidate: Option<Candidate>,

    /// Review of that candidate, if any
    #[serde(default)]
    pub previous_review: Option<ReviewIteration>,

    #[serde(default)]
    pub host_names: Vec<String>,

    #[serde(default)]
    pub chapters: Option<String>,

    #[serde(default)]
    pub episode_summary: Option<String>,

    /// 1-based iteration this call belongs to
    pub iteration: u32,

    pub max_iterations: u32,
}

/// Request for one Reviewer call; the candidate under review travels
/// alongside as its own argument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerInput {
    pub asset_id: String,

    #[serde(default)]
    pub previous_candidate: Option<Candidate>,

    #[serde(default)]
    pub previous_review: Option<ReviewIteration>,

    #[serde(default)]
    pub host_names: Vec<String>,

    #[serde(default)]
    pub chapters: Option<String>,

    #[serde(default)]
    pub episode_summary: Option<String>,

    pub iteration: u32,

    pub max_iterations: u32,
}

/// Reply from one Creator call
#[derive(Debug, Clone)]
pub struct CreatorOutput {
    pub candidate: Candidate,

    /// Creator's claim that the asset needs no further drafting
    pub done: bool,

    /// Whether the creator touched workspace files. Recorded for
    /// diagnostics; the loop itself never branches on it.
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creator_input_serializes_for_prompt() {
        let input = CreatorInput {
            asset_id: "description".to_string(),
            previous_candidate: None,
            previous_review: None,
            host_names: vec!["Ana".to_string(), "Ben".to_string()],
            chapters: Some("01 Intro\n02 Main".to_string()),
            episode_summary: None,
            iteration: 1,
            max_iterations: 3,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["asset_id"], "description");
        assert_eq!(json["iteration"], 1);
        assert_eq!(json["host_names"][1], "Ben");
        assert!(json["previous_candidate"].is_null());
    }

    #[test]
    fn test_reviewer_input_deserializes_with_defaults() {
        let raw = r#"{"asset_id": "slug", "iteration": 2, "max_iterations": 4}"#;
        let input: ReviewerInput = serde_json::from_str(raw).unwrap();
        assert!(input.previous_candidate.is_none());
        assert!(input.host_names.is_empty());
        assert_eq!(input.max_iterations, 4);
    }
}
