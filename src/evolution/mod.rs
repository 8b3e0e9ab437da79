//! Self-evolving reasoning patterns
//!
//! Each cycle scores patterns from their `pattern_usage` records:
//!
//! ```text
//! score = 0.30 success + 0.15 relevance - 0.25 qa_escape
//!       - 0.10 conflicts + 0.20 builder_consistency + 0.10 drift_stability
//! ```
//!
//! clamped to `[0, 1]`, then classifies every pattern as stable (>= 0.8),
//! monitored (>= 0.4) or a retirement candidate. Applied changes are
//! recorded in the governance event log.

pub mod engine;
pub mod event_log;
pub mod metrics;
pub mod pattern_store;
pub mod types;

pub use engine::EvolutionEngine;
pub use event_log::{evidence_digest, EventLog};
pub use pattern_store::PatternStore;
pub use types::{
    ClassifiedPatterns, ConfidenceLevel, ConsolidatedPatternSet, EvolutionEvent,
    EvolutionProposal, EvolutionReport, PatternClass, PatternMetrics, ReasoningPattern,
};
