//! Domain types for redraft
//!
//! This module contains the core data model:
//! - Candidate: one drafted version of an asset's content
//! - ReviewIteration / ReviewIssue: one reviewer verdict and its findings
//! - LoopDecision / LoopProtocolIteration / LoopProtocolState: the persisted
//!   protocol a loop run extends and replays
//! - CreatorInput / ReviewerInput / CreatorOutput: ephemeral capability shapes

pub mod candidate;
pub mod inputs;
pub mod protocol;
pub mod review;

pub use candidate::{Candidate, ContentFormat, ProvenanceEntry, is_valid_asset_id};
pub use inputs::{CreatorInput, CreatorOutput, ReviewerInput};
pub use protocol::{
    LoopDecision, LoopOutcome, LoopProtocolIteration, LoopProtocolState, REASON_CONVERGED,
    REASON_ITERATION_LIMIT, merge_decision,
};
pub use review::{IssueSeverity, ReviewIssue, ReviewIteration, ReviewVerdict};
