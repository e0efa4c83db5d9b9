//! ID generation utilities for redraft
//!
//! Provides unique identifiers for candidates and review issues, plus the
//! deterministic variant used by scripted fixtures.

use uuid::Uuid;

/// Generate a fresh candidate ID
pub fn generate_candidate_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a fresh review issue ID
pub fn generate_issue_id() -> Uuid {
    Uuid::new_v4()
}

/// Derive a stable ID from a prefix and name parts
///
/// UUIDv5 over the nil namespace, hashing `{prefix}:{part}:{part}:...`.
/// Scripted fixtures use this so repeated runs produce identical output.
pub fn deterministic_id(prefix: &str, parts: &[&str]) -> Uuid {
    let mut name = prefix.to_string();
    for part in parts {
        name.push(':');
        name.push_str(part);
    }
    Uuid::new_v5(&Uuid::nil(), name.as_bytes())
}
