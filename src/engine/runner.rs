//! Review loop engine
//!
//! Drives the Creator/Reviewer iteration cycle for one asset: build the
//! inputs, call both capabilities, validate their replies, record the
//! iteration envelope, and evaluate the convergence rules. The engine never
//! touches persistence; it returns the extended state and the envelopes it
//! appended, and its caller decides what to write.
//!
//! Replay safety: a prior state whose decision is locked and terminal is
//! returned unchanged without a single capability call.

use std::sync::Arc;

use log::{debug, info};

use crate::capability::{Creator, Reviewer};
use crate::domain::{
    CreatorInput, LoopDecision, LoopProtocolIteration, LoopProtocolState, REASON_ITERATION_LIMIT,
    ReviewerInput, merge_decision,
};
use crate::engine::evaluator::{Evaluation, evaluate};
use crate::error::{RedraftError, Result};

/// Everything a single loop run needs to know about its asset and episode
#[derive(Debug, Clone)]
pub struct LoopRequest {
    pub asset_id: String,
    pub max_iterations: u32,
    pub host_names: Vec<String>,
    pub chapters: Option<String>,
    pub episode_summary: Option<String>,
}

impl LoopRequest {
    pub fn new(asset_id: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            asset_id: asset_id.into(),
            max_iterations,
            host_names: Vec::new(),
            chapters: None,
            episode_summary: None,
        }
    }

    pub fn with_host_names(mut self, host_names: Vec<String>) -> Self {
        self.host_names = host_names;
        self
    }

    pub fn with_chapters(mut self, chapters: impl Into<String>) -> Self {
        self.chapters = Some(chapters.into());
        self
    }

    pub fn with_episode_summary(mut self, summary: impl Into<String>) -> Self {
        self.episode_summary = Some(summary.into());
        self
    }
}

/// What one engine run produced
#[derive(Debug, Clone)]
pub struct EngineRun {
    /// The full state after the run, prior iterations included
    pub state: LoopProtocolState,

    /// Envelopes appended by this run, in iteration order
    pub appended: Vec<LoopProtocolIteration>,

    /// True when a locked terminal decision made the run a no-op
    pub replayed: bool,
}

/// The state machine driving one asset's review loop
pub struct ReviewLoopEngine<C, R> {
    creator: Arc<C>,
    reviewer: Arc<R>,
}

impl<C: Creator, R: Reviewer> ReviewLoopEngine<C, R> {
    pub fn new(creator: Arc<C>, reviewer: Arc<R>) -> Self {
        Self { creator, reviewer }
    }

    /// Run the loop for one asset, resuming from `prior` when given
    pub async fn run(
        &self,
        request: &LoopRequest,
        prior: Option<LoopProtocolState>,
    ) -> Result<EngineRun> {
        if request.max_iterations < 1 {
            return Err(RedraftError::Config(format!(
                "max_iterations must be at least 1, got {}",
                request.max_iterations
            )));
        }

        let mut state = match prior {
            Some(existing) => {
                existing.validate()?;
                if existing.asset_id != request.asset_id {
                    return Err(RedraftError::StateConsistency {
                        asset_id: request.asset_id.clone(),
                        detail: format!("prior state belongs to '{}'", existing.asset_id),
                    });
                }
                if existing.max_iterations != request.max_iterations {
                    return Err(RedraftError::StateConsistency {
                        asset_id: request.asset_id.clone(),
                        detail: format!(
                            "prior state records max_iterations {} but the run requested {}",
                            existing.max_iterations, request.max_iterations
                        ),
                    });
                }
                if existing.decision.is_locked_terminal() {
                    debug!(
                        "decision for '{}' already locked as {}, replaying unchanged",
                        request.asset_id,
                        existing.decision.outcome()
                    );
                    return Ok(EngineRun {
                        state: existing,
                        appended: Vec::new(),
                        replayed: true,
                    });
                }
                existing
            }
            None => LoopProtocolState::new(&request.asset_id, request.max_iterations),
        };

        // Prior state already at the cap with no terminal decision: nothing
        // left to iterate, settle it without calling the capabilities.
        if state.iterations.len() as u32 >= request.max_iterations
            && !state.decision.outcome().is_terminal()
        {
            let proposed =
                LoopDecision::needs_human(state.last_iteration(), REASON_ITERATION_LIMIT);
            state.decision = merge_decision(Some(&state.decision), proposed);
            info!(
                "loop for '{}' is out of iterations, marked needs_human",
                request.asset_id
            );
            return Ok(EngineRun {
                state,
                appended: Vec::new(),
                replayed: false,
            });
        }

        let mut appended = Vec::new();
        let start = state.last_iteration() + 1;
        for iteration in start..=request.max_iterations {
            debug!(
                "iteration {}/{} for '{}'",
                iteration, request.max_iterations, request.asset_id
            );

            let creator_input = CreatorInput {
                asset_id: request.asset_id.clone(),
                previous_candidate: state.iterations.last().map(|e| e.candidate.clone()),
                previous_review: state.iterations.last().map(|e| e.review.clone()),
                host_names: request.host_names.clone(),
                chapters: request.chapters.clone(),
                episode_summary: request.episode_summary.clone(),
                iteration,
                max_iterations: request.max_iterations,
            };
            let output = self.creator.produce(&creator_input).await?;
            if output.candidate.asset_id != request.asset_id {
                return Err(RedraftError::ProtocolValidation {
                    asset_id: request.asset_id.clone(),
                    iteration,
                    field: "candidate.asset_id",
                    detail: format!(
                        "creator produced a candidate for '{}'",
                        output.candidate.asset_id
                    ),
                });
            }

            let reviewer_input = ReviewerInput {
                asset_id: request.asset_id.clone(),
                previous_candidate: state.iterations.last().map(|e| e.candidate.clone()),
                previous_review: state.iterations.last().map(|e| e.review.clone()),
                host_names: request.host_names.clone(),
                chapters: request.chapters.clone(),
                episode_summary: request.episode_summary.clone(),
                iteration,
                max_iterations: request.max_iterations,
            };
            let review = self.reviewer.review(&output.candidate, &reviewer_input).await?;
            if review.iteration != iteration {
                return Err(RedraftError::ProtocolValidation {
                    asset_id: request.asset_id.clone(),
                    iteration,
                    field: "review.iteration",
                    detail: format!("reviewer answered for iteration {}", review.iteration),
                });
            }
            if review.violates_ok_invariant() {
                return Err(RedraftError::ProtocolValidation {
                    asset_id: request.asset_id.clone(),
                    iteration,
                    field: "verdict",
                    detail: "ok verdict with error-severity issues".to_string(),
                });
            }

            let verdict = review.verdict;
            let done = output.done;
            let entry = LoopProtocolIteration {
                iteration,
                creator_done: done,
                candidate: output.candidate,
                review,
            };
            state.iterations.push(entry.clone());
            appended.push(entry);

            match evaluate(verdict, done, iteration, request.max_iterations) {
                Evaluation::Converged => {
                    state.decision =
                        merge_decision(Some(&state.decision), LoopDecision::converged(iteration));
                    info!(
                        "loop for '{}' converged at iteration {}",
                        request.asset_id, iteration
                    );
                    break;
                }
                Evaluation::NeedsHuman { reason } => {
                    state.decision = merge_decision(
                        Some(&state.decision),
                        LoopDecision::needs_human(iteration, reason),
                    );
                    info!(
                        "loop for '{}' stopped after iteration {} ({})",
                        request.asset_id, iteration, reason
                    );
                    break;
                }
                Evaluation::InProgress => {}
            }
        }

        Ok(EngineRun {
            state,
            appended,
            replayed: false,
        })
    }
}
