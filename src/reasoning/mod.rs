//! Governed reasoning over the memory fabric
//!
//! - [`patterns`]: the pattern library (built-in, learned, evolved)
//! - [`orchestrator`]: the decision state machine
//! - [`types`]: requests, results and stage names

pub mod orchestrator;
pub mod patterns;
pub mod types;

pub use orchestrator::ReasoningOrchestrator;
pub use patterns::{builtin_patterns, LibraryPattern, PatternLibrary};
pub use types::{
    Decision, MatchedPattern, PatternSource, ReasoningRequest, ReasoningResult, ReasoningStage,
    RiskAnalysis,
};
