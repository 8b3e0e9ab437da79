//! Reasoning request and result types

use crate::drift::DriftStatus;
use crate::evolution::{ConfidenceLevel, PatternClass};
use crate::memory::{ContextSufficiency, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request for a governed decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningRequest {
    /// Intent key (e.g. `bug_fix`) or a short free-text intent
    pub intent: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Tags describing the requested work
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub subsystem: Option<String>,
    /// Defaults to medium
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Asks to act without loading memory. Always rejected.
    #[serde(default)]
    pub skip_memory: bool,
    /// Opt out of the drift pre-check
    #[serde(default)]
    pub skip_drift_check: bool,
}

impl ReasoningRequest {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            ..Default::default()
        }
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk_level.unwrap_or(RiskLevel::Medium)
    }

    /// Normalised intent used as the router table key
    pub fn intent_key(&self) -> String {
        self.intent.trim().to_ascii_lowercase().replace([' ', '-'], "_")
    }
}

/// Orchestrator state machine stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasoningStage {
    IntentCheck,
    DriftCheck,
    Load,
    Filter,
    Merge,
    Route,
    Snapshot,
    PlanningGovernanceCheck,
    PatternMatch,
    RiskAnalysis,
    DecisionSynthesis,
    ActionSynthesis,
    Result,
}

/// Final verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    ProceedWithCaution,
    Block,
}

/// Where a library pattern came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    BuiltIn,
    Learned,
    Evolved,
}

/// A library pattern applied to the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPattern {
    pub id: String,
    pub name: String,
    pub approach: String,
    pub confidence: ConfidenceLevel,
    pub class: PatternClass,
    pub source: PatternSource,
    pub reason: String,
}

/// Risk assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub requested: RiskLevel,
    pub assessed: RiskLevel,
    /// Failure records inside the recent-failure window
    pub recent_failures: usize,
    pub open_blockers: usize,
    /// Mandatory governance rules in context
    pub strict_rules: usize,
    pub factors: Vec<String>,
}

/// Governed decision for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningResult {
    pub intent: String,
    pub decision: Decision,
    /// Mean confidence of matched patterns, 0.5 when none matched
    pub confidence: f64,
    pub risk: RiskAnalysis,
    pub matched_patterns: Vec<MatchedPattern>,
    pub recommended_actions: Vec<String>,
    pub warnings: Vec<String>,
    /// Ids of the routed context records
    pub context_record_ids: Vec<String>,
    pub knowledge_blocks_merged: usize,
    pub context: ContextSufficiency,
    pub filtering_reason: String,
    pub consolidation_recommended: bool,
    /// `None` when the drift pre-check was skipped
    pub drift_status: Option<DriftStatus>,
    pub stages: Vec<ReasoningStage>,
    pub generated_at: DateTime<Utc>,
}
