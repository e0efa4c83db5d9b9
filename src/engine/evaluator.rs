//! Convergence rule evaluator
//!
//! Pure mapping from one iteration's facts to an outcome. Rules in priority
//! order:
//! 1. reviewer said `ok` AND creator declared done: converged
//! 2. the iteration cap is reached: needs_human("iteration_limit")
//! 3. otherwise: keep going
//!
//! A reviewer `needs_human` verdict is advisory: it is recorded but does not
//! terminate the loop on its own. Termination is a joint act, except for the
//! cap in rule 2, which keeps every loop bounded.

use crate::domain::{REASON_ITERATION_LIMIT, ReviewVerdict};

/// Result of evaluating one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    InProgress,
    Converged,
    NeedsHuman { reason: &'static str },
}

impl Evaluation {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Evaluation::InProgress)
    }
}

/// Apply the convergence rules to one completed iteration
pub fn evaluate(
    verdict: ReviewVerdict,
    creator_done: bool,
    iteration: u32,
    max_iterations: u32,
) -> Evaluation {
    if verdict == ReviewVerdict::Ok && creator_done {
        return Evaluation::Converged;
    }
    if iteration >= max_iterations {
        return Evaluation::NeedsHuman {
            reason: REASON_ITERATION_LIMIT,
        };
    }
    Evaluation::InProgress
}
