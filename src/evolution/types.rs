//! Evolution data types

use crate::memory::{MemoryRecord, PatternPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared confidence of a reasoning pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Value used when averaging matched patterns into a decision confidence
    pub fn bucket_value(&self) -> f64 {
        match self {
            ConfidenceLevel::High => 0.9,
            ConfidenceLevel::Medium => 0.6,
            ConfidenceLevel::Low => 0.3,
        }
    }

    /// Parse a loosely written level. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(ConfidenceLevel::High),
            "medium" => Some(ConfidenceLevel::Medium),
            "low" => Some(ConfidenceLevel::Low),
            _ => None,
        }
    }
}

/// Lifecycle class derived from the performance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternClass {
    Stable,
    Monitored,
    RetirementCandidate,
}

impl PatternClass {
    /// Stable at 0.8 and above, monitored at 0.4 and above
    pub fn classify(score: f64) -> Self {
        if score >= 0.8 {
            PatternClass::Stable
        } else if score >= 0.4 {
            PatternClass::Monitored
        } else {
            PatternClass::RetirementCandidate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternClass::Stable => "stable",
            PatternClass::Monitored => "monitored",
            PatternClass::RetirementCandidate => "retirement_candidate",
        }
    }
}

impl fmt::Display for PatternClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, reusable decision heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningPattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub context: String,
    pub approach: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub usage_count: Option<u64>,
    #[serde(default)]
    pub performance_score: Option<f64>,
    /// Immutable patterns are never rescored or removed
    #[serde(default)]
    pub immutable: bool,
    #[serde(default)]
    pub confidence: ConfidenceLevel,
    /// Core patterns are always matched at high risk
    #[serde(default)]
    pub core: bool,
    #[serde(default)]
    pub last_evolved: Option<DateTime<Utc>>,
}

impl ReasoningPattern {
    /// Class of the pattern. Unscored patterns are monitored.
    pub fn class(&self) -> PatternClass {
        self.performance_score
            .map(PatternClass::classify)
            .unwrap_or(PatternClass::Monitored)
    }

    /// Build a learned pattern from a `reasoning_pattern` record.
    ///
    /// The id falls back to the record key and the name to the id. Returns
    /// `None` when the payload does not parse.
    pub fn from_record(record: &MemoryRecord) -> Option<Self> {
        let payload: PatternPayload = serde_json::from_value(record.value.clone()).ok()?;
        let id = payload
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| record.key.clone());
        let name = payload
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        let tags = record
            .tags
            .iter()
            .filter(|t| t.as_str() != "reasoning_pattern" && t.as_str() != "pattern")
            .cloned()
            .collect();

        Some(Self {
            id,
            name,
            description: payload.description.unwrap_or_default(),
            context: payload.context.unwrap_or_default(),
            approach: payload.approach.unwrap_or_default(),
            examples: payload.examples,
            tags,
            success_rate: payload.success_rate,
            usage_count: payload.usage_count,
            performance_score: payload.performance_score,
            immutable: payload.immutable.unwrap_or(false),
            confidence: payload
                .confidence
                .as_deref()
                .and_then(ConfidenceLevel::parse)
                .unwrap_or_default(),
            core: payload.core.unwrap_or(false),
            last_evolved: None,
        })
    }
}

/// Observed performance of one pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMetrics {
    pub pattern_id: String,
    pub usage_count: usize,
    pub success_rate: f64,
    /// Usage count normalised against the relevance ceiling
    pub relevance: f64,
    pub qa_failure_escape_rate: f64,
    pub architecture_conflicts: usize,
    pub builder_consistency: f64,
    pub drift_stability: f64,
    /// Usage record ids, sorted
    pub evidence: Vec<String>,
}

/// A proposed score change with its supporting evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionProposal {
    pub pattern_id: String,
    pub previous_score: Option<f64>,
    pub proposed_score: f64,
    pub usage_count: usize,
    pub success_rate: f64,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub reason: String,
}

/// Audit-log entry for an applied proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionEvent {
    pub id: String,
    pub pattern_id: String,
    pub previous_score: Option<f64>,
    pub new_score: f64,
    pub classification: PatternClass,
    pub confidence: f64,
    pub reason: String,
    pub evidence: Vec<String>,
    /// SHA-256 over the evidence ids, hex encoded
    pub evidence_digest: String,
    pub applied_at: DateTime<Utc>,
}

/// Patterns grouped by class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedPatterns {
    pub stable: Vec<ReasoningPattern>,
    pub monitored: Vec<ReasoningPattern>,
    pub retirement_candidates: Vec<ReasoningPattern>,
}

/// The consolidated pattern document, rewritten every evolution cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedPatternSet {
    pub last_updated: DateTime<Utc>,
    pub total_patterns: usize,
    pub stable_patterns: usize,
    pub monitored_patterns: usize,
    pub retirement_candidates: usize,
    pub patterns: ClassifiedPatterns,
}

impl ConsolidatedPatternSet {
    /// Group patterns by class, each group ordered by id.
    pub fn from_patterns(mut patterns: Vec<ReasoningPattern>, now: DateTime<Utc>) -> Self {
        patterns.sort_by(|a, b| a.id.cmp(&b.id));
        let mut grouped = ClassifiedPatterns::default();
        for pattern in patterns {
            match pattern.class() {
                PatternClass::Stable => grouped.stable.push(pattern),
                PatternClass::Monitored => grouped.monitored.push(pattern),
                PatternClass::RetirementCandidate => grouped.retirement_candidates.push(pattern),
            }
        }
        Self {
            last_updated: now,
            total_patterns: grouped.stable.len()
                + grouped.monitored.len()
                + grouped.retirement_candidates.len(),
            stable_patterns: grouped.stable.len(),
            monitored_patterns: grouped.monitored.len(),
            retirement_candidates: grouped.retirement_candidates.len(),
            patterns: grouped,
        }
    }

    /// Every pattern in the set, stable first.
    pub fn all(&self) -> impl Iterator<Item = &ReasoningPattern> {
        self.patterns
            .stable
            .iter()
            .chain(self.patterns.monitored.iter())
            .chain(self.patterns.retirement_candidates.iter())
    }
}

/// Summary of one evolution cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionReport {
    pub patterns_evaluated: usize,
    pub proposals_generated: usize,
    pub proposals_applied: usize,
    pub proposals_discarded: usize,
    pub skipped_immutable: usize,
    pub events: Vec<EvolutionEvent>,
    pub stable_patterns: usize,
    pub monitored_patterns: usize,
    pub retirement_candidates: usize,
    /// Per-item failures that were skipped
    pub failures: Vec<String>,
    pub completed_at: DateTime<Utc>,
}
