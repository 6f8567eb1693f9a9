// Resume structuring: AI extraction first, heuristic recovery as the fallback.

pub mod ai;
pub mod handlers;
pub mod heuristic;
pub mod orchestrator;
pub mod prompts;
pub mod tables;

pub use ai::AiExtractor;
pub use orchestrator::ResumeParser;
pub use tables::{CompiledTables, HeuristicTables};
