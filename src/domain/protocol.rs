//! Persisted loop protocol types
//!
//! The protocol records everything a loop run decides: one envelope per
//! iteration (written exactly once, never rewritten) and a decision that,
//! once locked in a terminal outcome, never changes again. Replaying a run
//! over a locked decision is a no-op.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::candidate::{Candidate, is_valid_asset_id};
use crate::domain::review::ReviewIteration;
use crate::error::{RedraftError, Result};

/// Reason recorded when both agents agree the asset is finished
pub const REASON_CONVERGED: &str = "reviewer_ok_and_creator_done";

/// Reason recorded when the loop hits its iteration cap without agreement
pub const REASON_ITERATION_LIMIT: &str = "iteration_limit";

/// Outcome of a loop run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOutcome {
    #[default]
    InProgress,
    Converged,
    NeedsHuman,
}

impl LoopOutcome {
    /// Returns true for outcomes that end the loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopOutcome::Converged | LoopOutcome::NeedsHuman)
    }
}

impl fmt::Display for LoopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopOutcome::InProgress => "in_progress",
            LoopOutcome::Converged => "converged",
            LoopOutcome::NeedsHuman => "needs_human",
        };
        write!(f, "{}", s)
    }
}

/// The (possibly terminal) decision of a loop run
///
/// Fields are private on purpose: a terminal locked decision is immutable,
/// so the only ways to obtain one are the constructors here and
/// [`merge_decision`], which always carries a locked decision through whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopDecision {
    outcome: LoopOutcome,
    final_iteration: Option<u32>,
    reason: Option<String>,
    locked: bool,
}

impl LoopDecision {
    /// Decision for a loop that has not terminated
    pub fn in_progress() -> Self {
        Self::default()
    }

    /// Locked terminal decision: both agents agreed at `final_iteration`
    pub fn converged(final_iteration: u32) -> Self {
        Self {
            outcome: LoopOutcome::Converged,
            final_iteration: Some(final_iteration),
            reason: Some(REASON_CONVERGED.to_string()),
            locked: true,
        }
    }

    /// Locked terminal decision: a human has to take over
    pub fn needs_human(final_iteration: u32, reason: &str) -> Self {
        Self {
            outcome: LoopOutcome::NeedsHuman,
            final_iteration: Some(final_iteration),
            reason: Some(reason.to_string()),
            locked: true,
        }
    }

    pub fn outcome(&self) -> LoopOutcome {
        self.outcome
    }

    pub fn final_iteration(&self) -> Option<u32> {
        self.final_iteration
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Locked and terminal: replaying a run over this decision changes nothing
    pub fn is_locked_terminal(&self) -> bool {
        self.locked && self.outcome.is_terminal()
    }
}

/// Merge a newly computed decision over a prior one
///
/// A locked terminal prior wins whole: its outcome, final iteration, and
/// reason survive every later merge. Otherwise the proposed decision
/// replaces the prior.
pub fn merge_decision(prior: Option<&LoopDecision>, proposed: LoopDecision) -> LoopDecision {
    match prior {
        Some(existing) if existing.is_locked_terminal() => existing.clone(),
        _ => proposed,
    }
}

/// Persisted envelope for one loop iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopProtocolIteration {
    /// 1-based iteration number
    pub iteration: u32,

    /// Whether the creator declared the asset finished this iteration
    pub creator_done: bool,

    pub candidate: Candidate,

    pub review: ReviewIteration,
}

/// Full persisted state of one asset's loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopProtocolState {
    pub asset_id: String,

    pub max_iterations: u32,

    #[serde(default)]
    pub iterations: Vec<LoopProtocolIteration>,

    #[serde(default)]
    pub decision: LoopDecision,
}

impl LoopProtocolState {
    /// Empty state for an asset that has not started
    pub fn new(asset_id: &str, max_iterations: u32) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            max_iterations,
            iterations: Vec::new(),
            decision: LoopDecision::in_progress(),
        }
    }

    /// Iteration number of the last recorded envelope, 0 if none
    pub fn last_iteration(&self) -> u32 {
        self.iterations.last().map(|it| it.iteration).unwrap_or(0)
    }

    /// Check every structural invariant of a loaded state
    ///
    /// Called before a run extends prior state; a corrupt state is refused
    /// rather than repaired.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_asset_id(&self.asset_id) {
            return Err(self.inconsistent(format!(
                "asset id '{}' does not match ^[a-z][a-z0-9_]*$",
                self.asset_id
            )));
        }
        if self.max_iterations < 1 {
            return Err(self.inconsistent("max_iterations must be at least 1".to_string()));
        }
        if self.iterations.len() > self.max_iterations as usize {
            return Err(self.inconsistent(format!(
                "{} iterations recorded but max_iterations is {}",
                self.iterations.len(),
                self.max_iterations
            )));
        }
        for (index, entry) in self.iterations.iter().enumerate() {
            let expected = index as u32 + 1;
            if entry.iteration != expected {
                return Err(self.inconsistent(format!(
                    "iteration {} found at position {}, expected {}",
                    entry.iteration, index, expected
                )));
            }
            if entry.candidate.asset_id != self.asset_id {
                return Err(self.inconsistent(format!(
                    "iteration {} candidate belongs to '{}'",
                    entry.iteration, entry.candidate.asset_id
                )));
            }
            if entry.review.iteration != entry.iteration {
                return Err(self.inconsistent(format!(
                    "iteration {} carries a review numbered {}",
                    entry.iteration, entry.review.iteration
                )));
            }
        }
        if let Some(final_iteration) = self.decision.final_iteration() {
            if self.last_iteration() != final_iteration {
                return Err(self.inconsistent(format!(
                    "decision final_iteration {} but last recorded iteration is {}",
                    final_iteration,
                    self.last_iteration()
                )));
            }
        }
        if self.decision.is_locked_terminal() && self.decision.final_iteration().is_none() {
            return Err(self.inconsistent(
                "locked terminal decision without a final_iteration".to_string(),
            ));
        }
        Ok(())
    }

    fn inconsistent(&self, detail: String) -> RedraftError {
        RedraftError::StateConsistency {
            asset_id: self.asset_id.clone(),
            detail,
        }
    }
}
