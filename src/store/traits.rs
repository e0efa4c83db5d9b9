//! Persistence seam between the orchestrator and the workspace

use async_trait::async_trait;

use crate::domain::{
    Candidate, ContentFormat, LoopProtocolIteration, LoopProtocolState, ReviewIteration,
};
use crate::error::Result;

/// Everything the orchestrator persists or reads back for one asset's loop
#[async_trait]
pub trait ProtocolStore: Send + Sync {
    /// Load the recorded protocol state, `None` when the asset has no history
    async fn load_protocol_state(&self, asset_id: &str) -> Result<Option<LoopProtocolState>>;

    /// Write one iteration envelope
    async fn write_protocol_iteration(
        &self,
        asset_id: &str,
        entry: &LoopProtocolIteration,
    ) -> Result<()>;

    /// Write the full protocol state, replacing any previous snapshot
    async fn write_protocol_state(&self, state: &LoopProtocolState) -> Result<()>;

    /// Write a candidate, both its envelope and its raw text
    async fn write_candidate(&self, candidate: &Candidate) -> Result<()>;

    /// Write one review iteration
    async fn write_review(&self, asset_id: &str, review: &ReviewIteration) -> Result<()>;

    /// Publish the converged text as the asset's selection
    async fn write_selected_text(
        &self,
        asset_id: &str,
        format: ContentFormat,
        content: &str,
    ) -> Result<()>;

    /// Newest candidate already sitting in the workspace, used to seed fresh loops
    async fn latest_seed_candidate(&self, asset_id: &str) -> Result<Option<Candidate>>;
}
