//! Error types for redraft
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in redraft
#[derive(Debug, Error)]
pub enum RedraftError {
    /// A Creator or Reviewer capability could not produce a valid result
    #[error("{role} capability failed for '{asset_id}' at iteration {iteration}: {detail}")]
    Capability {
        role: String,
        asset_id: String,
        iteration: u32,
        detail: String,
    },

    /// A capability produced a structurally invalid result
    #[error("protocol violation for '{asset_id}' at iteration {iteration} ({field}): {detail}")]
    ProtocolValidation {
        asset_id: String,
        iteration: u32,
        field: &'static str,
        detail: String,
    },

    /// Loaded protocol state violates an invariant
    #[error("inconsistent protocol state for '{asset_id}': {detail}")]
    StateConsistency { asset_id: String, detail: String },

    /// Workspace persistence error
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for redraft operations
pub type Result<T> = std::result::Result<T, RedraftError>;
