//! Capability wrappers applied by the orchestrator
//!
//! `SeededCreator` hands the newest workspace candidate to the creator when
//! the loop starts from nothing. `LockedSelectionReviewer` guards assets
//! whose selection is already published: a candidate that drifts from the
//! selected text gets an error issue and loses its ok verdict.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use crate::capability::{Creator, Reviewer, SelectionLookup};
use crate::domain::{
    Candidate, CreatorInput, CreatorOutput, IssueSeverity, ReviewIssue, ReviewIteration,
    ReviewVerdict, ReviewerInput,
};
use crate::error::Result;
use crate::id::generate_issue_id;

/// Issue code attached when a locked selection disagrees with the candidate
pub const CODE_LOCKED_SELECTION: &str = "locked_selection";

fn normalized(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

/// Creator wrapper that injects a workspace seed as the first previous candidate
pub struct SeededCreator<C> {
    inner: Arc<C>,
    seed: Mutex<Option<Candidate>>,
}

impl<C> SeededCreator<C> {
    pub fn new(inner: Arc<C>, seed: Option<Candidate>) -> Self {
        Self {
            inner,
            seed: Mutex::new(seed),
        }
    }
}

#[async_trait]
impl<C: Creator> Creator for SeededCreator<C> {
    async fn produce(&self, input: &CreatorInput) -> Result<CreatorOutput> {
        if input.previous_candidate.is_some() {
            return self.inner.produce(input).await;
        }
        match self.seed.lock().await.take() {
            Some(candidate) => {
                debug!(
                    "seeding creator for '{}' with candidate {}",
                    input.asset_id, candidate.candidate_id
                );
                let mut seeded = input.clone();
                seeded.previous_candidate = Some(candidate);
                self.inner.produce(&seeded).await
            }
            None => self.inner.produce(input).await,
        }
    }
}

/// Reviewer wrapper enforcing the selection lock for protected assets
pub struct LockedSelectionReviewer<R, L> {
    inner: Arc<R>,
    selections: Arc<L>,
    enabled: bool,
}

impl<R, L> LockedSelectionReviewer<R, L> {
    pub fn new(inner: Arc<R>, selections: Arc<L>, enabled: bool) -> Self {
        Self {
            inner,
            selections,
            enabled,
        }
    }
}

#[async_trait]
impl<R: Reviewer, L: SelectionLookup> Reviewer for LockedSelectionReviewer<R, L> {
    async fn review(
        &self,
        candidate: &Candidate,
        input: &ReviewerInput,
    ) -> Result<ReviewIteration> {
        let mut review = self.inner.review(candidate, input).await?;
        if !self.enabled {
            return Ok(review);
        }
        let Some(selected) = self.selections.selected_content(&candidate.asset_id).await? else {
            return Ok(review);
        };
        if normalized(&selected) == normalized(&candidate.content) {
            return Ok(review);
        }

        debug!(
            "candidate for '{}' drifts from its locked selection",
            candidate.asset_id
        );
        review.issues.push(ReviewIssue {
            issue_id: generate_issue_id(),
            message: format!(
                "selection for '{}' is locked and the candidate content differs",
                candidate.asset_id
            ),
            severity: IssueSeverity::Error,
            code: Some(CODE_LOCKED_SELECTION.to_string()),
            field: Some("content".to_string()),
        });
        // An error issue may not ride along with an ok verdict.
        if review.verdict == ReviewVerdict::Ok {
            review.verdict = ReviewVerdict::ChangesRequested;
        }
        Ok(review)
    }
}
