//! Capability trait definitions
//!
//! The loop engine is agnostic to how drafts and reviews are produced: it
//! consumes these traits. Two implementations ship with the crate, a
//! subprocess-backed one for real agent CLIs and a scripted one for fixtures.

use async_trait::async_trait;

use crate::domain::{Candidate, CreatorInput, CreatorOutput, ReviewIteration, ReviewerInput};
use crate::error::Result;

/// Drafts one candidate per call
///
/// Called with monotonically increasing `iteration`. Any retry or process
/// management is the implementation's concern; the engine only sees success
/// or failure.
#[async_trait]
pub trait Creator: Send + Sync {
    async fn produce(&self, input: &CreatorInput) -> Result<CreatorOutput>;
}

/// Reviews one candidate per call
///
/// The returned iteration number must equal `input.iteration`, and an `ok`
/// verdict must not carry error-severity issues; the engine rejects replies
/// that break either rule.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, candidate: &Candidate, input: &ReviewerInput)
    -> Result<ReviewIteration>;
}

/// Read access to previously finalized selections
///
/// Backs the sticky-selection lock. Passed into the orchestrator explicitly
/// so the lock can be tested without a filesystem.
#[async_trait]
pub trait SelectionLookup: Send + Sync {
    /// Already-selected content for an asset, if any selection exists
    async fn selected_content(&self, asset_id: &str) -> Result<Option<String>>;
}
