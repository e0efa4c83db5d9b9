//! Reviewer verdicts and issues
//!
//! A ReviewIteration records one reviewer pass over one candidate. The one
//! aggregate rule: an `ok` verdict may not carry an error-severity issue.
//! Callers reject a violation outright; nothing in this crate downgrades a
//! verdict silently on the reviewer's behalf.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::candidate::ProvenanceEntry;

/// Reviewer's verdict on a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Ok,
    ChangesRequested,
    NeedsHuman,
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewVerdict::Ok => "ok",
            ReviewVerdict::ChangesRequested => "changes_requested",
            ReviewVerdict::NeedsHuman => "needs_human",
        };
        write!(f, "{}", s)
    }
}

/// Severity of a single review issue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    #[default]
    Warning,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        write!(f, "{}", s)
    }
}

/// One reviewer-reported defect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub issue_id: Uuid,

    pub message: String,

    #[serde(default)]
    pub severity: IssueSeverity,

    /// Machine-readable issue code, e.g. "locked_selection"
    #[serde(default)]
    pub code: Option<String>,

    /// Field of the candidate the issue points at, e.g. "content"
    #[serde(default)]
    pub field: Option<String>,
}

/// One reviewer verdict for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIteration {
    /// Loop iteration this review belongs to (1-based)
    pub iteration: u32,

    pub verdict: ReviewVerdict,

    #[serde(default)]
    pub issues: Vec<ReviewIssue>,

    /// Label of the reviewer that produced this, e.g. "reviewer_a"
    #[serde(default)]
    pub reviewer: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub provenance: Vec<ProvenanceEntry>,
}

impl ReviewIteration {
    /// Returns true if any issue has error severity
    pub fn has_error_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == IssueSeverity::Error)
    }

    /// Returns true if the verdict/issue combination is invalid:
    /// `ok` paired with at least one error-severity issue
    pub fn violates_ok_invariant(&self) -> bool {
        self.verdict == ReviewVerdict::Ok && self.has_error_issues()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_with(verdict: ReviewVerdict, severities: &[IssueSeverity]) -> ReviewIteration {
        let issues = severities
            .iter()
            .enumerate()
            .map(|(i, severity)| ReviewIssue {
                issue_id: Uuid::nil(),
                message: format!("issue {}", i),
                severity: *severity,
                code: None,
                field: None,
            })
            .collect();
        ReviewIteration {
            iteration: 1,
            verdict,
            issues,
            reviewer: None,
            created_at: Utc::now(),
            summary: None,
            provenance: vec![],
        }
    }

    #[test]
    fn test_verdict_wire_format() {
        let json = serde_json::to_string(&ReviewVerdict::ChangesRequested).unwrap();
        assert_eq!(json, "\"changes_requested\"");
        let verdict: ReviewVerdict = serde_json::from_str("\"needs_human\"").unwrap();
        assert_eq!(verdict, ReviewVerdict::NeedsHuman);
    }

    #[test]
    fn test_severity_defaults_to_warning() {
        let raw = r#"{
            "issue_id": "00000000-0000-0000-0000-000000000000",
            "message": "tighten the intro"
        }"#;
        let issue: ReviewIssue = serde_json::from_str(raw).unwrap();
        assert_eq!(issue.severity, IssueSeverity::Warning);
    }

    #[test]
    fn test_ok_with_warning_issue_is_valid() {
        let review = review_with(ReviewVerdict::Ok, &[IssueSeverity::Warning]);
        assert!(!review.violates_ok_invariant());
    }

    #[test]
    fn test_ok_with_error_issue_violates_invariant() {
        let review = review_with(
            ReviewVerdict::Ok,
            &[IssueSeverity::Warning, IssueSeverity::Error],
        );
        assert!(review.violates_ok_invariant());
        assert!(review.has_error_issues());
    }

    #[test]
    fn test_changes_requested_with_error_issue_is_valid() {
        let review = review_with(ReviewVerdict::ChangesRequested, &[IssueSeverity::Error]);
        assert!(!review.violates_ok_invariant());
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(ReviewVerdict::Ok.to_string(), "ok");
        assert_eq!(
            ReviewVerdict::ChangesRequested.to_string(),
            "changes_requested"
        );
        assert_eq!(IssueSeverity::Error.to_string(), "error");
    }
}
