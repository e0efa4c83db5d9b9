//! Workspace persistence
//!
//! `WorkspaceLayout` is the pure path scheme, `WorkspaceStore` the filesystem
//! implementation behind the `ProtocolStore` seam. The store doubles as the
//! selection lookup for the sticky-selection guard.

mod layout;
mod traits;
mod workspace;

pub use layout::{WorkspaceLayout, safe_path_segment};
pub use traits::ProtocolStore;
pub use workspace::{EpisodeMeta, WorkspaceStore};
