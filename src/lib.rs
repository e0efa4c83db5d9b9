//! Redraft - a Creator/Reviewer convergence loop for episode copy
//!
//! Redraft turns podcast transcripts and summaries into reviewed episode
//! assets (description, shownotes, slug, titles) by iterating a Creator
//! agent against a Reviewer agent until both agree the text is done, then
//! recording every step in the episode workspace.

pub mod capability;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod id;
pub mod orchestrator;
pub mod store;

pub use error::{RedraftError, Result};
