//! Protocol engine: convergence evaluation and the iteration driver

pub mod evaluator;
pub mod runner;

pub use evaluator::{Evaluation, evaluate};
pub use runner::{EngineRun, LoopRequest, ReviewLoopEngine};
