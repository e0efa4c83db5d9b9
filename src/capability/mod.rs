//! Creator/Reviewer capability boundary
//!
//! Traits consumed by the loop engine plus the two implementations that ship
//! with the crate:
//! - subprocess: shells out to a configured agent CLI (JSON over stdin/stdout)
//! - scripted: answers from canned replies, for tests and dry runs

pub mod reply;
pub mod scripted;
pub mod subprocess;
pub mod traits;

pub use reply::{CandidateReply, CreatorReply, IssueReply, ReviewerReply};
pub use scripted::{ReplyScript, ScriptedCreator, ScriptedReply, ScriptedReviewer, fixture_epoch};
pub use subprocess::{CliCreator, CliReviewer, extract_json_payload};
pub use traits::{Creator, Reviewer, SelectionLookup};
