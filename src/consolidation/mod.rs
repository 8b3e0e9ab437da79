//! Knowledge consolidation
//!
//! Turns recurring raw records into knowledge blocks and marks old,
//! insignificant records for archival. Consolidation is additive: origin
//! records are never rewritten or deleted.

pub mod engine;
pub mod knowledge_store;
pub mod types;

pub use engine::ConsolidationEngine;
pub use knowledge_store::{ArchiveIndex, KnowledgeStore};
pub use types::{
    ArchiveReference, ConsolidationReport, ConsolidationTrigger, DetectedPattern, DuplicateGroup,
    Importance, KnowledgeBlock, KnowledgeBlockBuilder, PatternCategory, Recommendation,
    ScoreFactors, Significance, SignificanceScore,
};
