//! Consolidation data types
//!
//! Knowledge blocks are consolidated, evergreen lessons derived from several
//! raw records. They are additive: generating a block never mutates or
//! deletes its origin records.

use crate::error::{Error, Result};
use crate::memory::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Knowledge category derived from tag-name heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    QaPattern,
    DeploymentPattern,
    GovernancePattern,
    BuildPattern,
    ErrorPattern,
    ArchitecturePrinciple,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 6] = [
        PatternCategory::QaPattern,
        PatternCategory::DeploymentPattern,
        PatternCategory::GovernancePattern,
        PatternCategory::BuildPattern,
        PatternCategory::ErrorPattern,
        PatternCategory::ArchitecturePrinciple,
    ];

    /// Categorize a tag by keyword. Earlier rules win.
    pub fn from_tag(tag: &str) -> Self {
        const RULES: &[(&[&str], PatternCategory)] = &[
            (&["qa", "test"], PatternCategory::QaPattern),
            (&["deploy", "release"], PatternCategory::DeploymentPattern),
            (&["governance", "policy"], PatternCategory::GovernancePattern),
            (&["build", "compile"], PatternCategory::BuildPattern),
            (&["error", "bug", "failure", "crash"], PatternCategory::ErrorPattern),
        ];
        let tag = tag.to_ascii_lowercase();
        RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| tag.contains(k)))
            .map(|(_, category)| *category)
            .unwrap_or(PatternCategory::ArchitecturePrinciple)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::QaPattern => "qa_pattern",
            PatternCategory::DeploymentPattern => "deployment_pattern",
            PatternCategory::GovernancePattern => "governance_pattern",
            PatternCategory::BuildPattern => "build_pattern",
            PatternCategory::ErrorPattern => "error_pattern",
            PatternCategory::ArchitecturePrinciple => "architecture_principle",
        }
    }

    /// Lesson template; `{tag}` and `{count}` are substituted.
    pub fn lesson_template(&self) -> &'static str {
        match self {
            PatternCategory::QaPattern => {
                "QA failures tagged '{tag}' recurred {count} times. Add a regression test for this failure mode and keep the QA gate mandatory before merge."
            }
            PatternCategory::DeploymentPattern => {
                "Deployments tagged '{tag}' needed attention {count} times. Verify rollout prerequisites and keep a tested rollback path."
            }
            PatternCategory::GovernancePattern => {
                "Governance concerns tagged '{tag}' came up {count} times. Check the applicable policy before planning and treat it as non-negotiable."
            }
            PatternCategory::BuildPattern => {
                "Build problems tagged '{tag}' occurred {count} times. Pin toolchain and dependency versions and run a clean build before release."
            }
            PatternCategory::ErrorPattern => {
                "Errors tagged '{tag}' repeated {count} times. Address the root cause instead of the symptom and record the fix as a lesson."
            }
            PatternCategory::ArchitecturePrinciple => {
                "Records tagged '{tag}' recurred {count} times. Treat the shared approach as an architecture principle and document deviations."
            }
        }
    }

    /// Governance documents a category links to
    pub fn governance_links(&self) -> &'static [&'static str] {
        match self {
            PatternCategory::QaPattern => &["governance/qa-gate.md"],
            PatternCategory::DeploymentPattern => &["governance/deployment-policy.md"],
            PatternCategory::GovernancePattern => &["governance/policy.md"],
            PatternCategory::BuildPattern => &["governance/build-standards.md"],
            PatternCategory::ErrorPattern => &["governance/incident-response.md"],
            PatternCategory::ArchitecturePrinciple => &["governance/architecture-principles.md"],
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag shared by enough records to count as a recurring pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedPattern {
    pub tag: String,
    pub category: PatternCategory,
    pub occurrences: usize,
    /// `min(occurrences / 10, 1)`
    pub confidence: f64,
    /// Records in creation order
    pub record_ids: Vec<String>,
}

/// Records collapsed into the first occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub kept_id: String,
    pub collapsed_ids: Vec<String>,
}

/// Significance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Low,
    Medium,
    High,
}

impl Significance {
    /// High at 70 and above, medium at 40 and above
    pub fn classify(score: f64) -> Self {
        if score >= 70.0 {
            Significance::High
        } else if score >= 40.0 {
            Significance::Medium
        } else {
            Significance::Low
        }
    }
}

/// What to do with a scored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Consolidate,
    Keep,
    Archive,
    Delete,
}

/// Individual scoring factors
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactors {
    pub frequency: f64,
    pub severity: f64,
    pub project_breadth: f64,
    pub governance: f64,
    pub recurrence: f64,
    pub drift_risk: f64,
}

impl ScoreFactors {
    pub fn total(&self) -> f64 {
        self.frequency
            + self.severity
            + self.project_breadth
            + self.governance
            + self.recurrence
            + self.drift_risk
    }
}

/// Per-record significance in `[0, 100]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignificanceScore {
    pub record_id: String,
    pub score: f64,
    pub factors: ScoreFactors,
    pub classification: Significance,
    pub recommendation: Recommendation,
}

/// Importance of a knowledge block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

/// A consolidated, evergreen lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBlock {
    pub id: String,
    pub category: PatternCategory,
    pub summary: String,
    pub lesson: String,
    pub applies_to: Vec<String>,
    pub origin_record_ids: Vec<String>,
    pub governance_links: Vec<String>,
    pub confidence: f64,
    pub importance: Importance,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub last_validated: Option<DateTime<Utc>>,
}

impl KnowledgeBlock {
    /// Structural validation applied before a block is stored.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Consolidation("knowledge block id is empty".to_string()));
        }
        if self.summary.trim().is_empty() || self.lesson.trim().is_empty() {
            return Err(Error::Consolidation(format!(
                "knowledge block {} has an empty summary or lesson",
                self.id
            )));
        }
        if self.origin_record_ids.is_empty() {
            return Err(Error::Consolidation(format!(
                "knowledge block {} has no origin records",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Consolidation(format!(
                "knowledge block {} confidence {} is outside [0, 1]",
                self.id, self.confidence
            )));
        }
        Ok(())
    }

    /// Whether `other` would duplicate this block.
    pub fn overlaps(&self, other: &KnowledgeBlock) -> bool {
        self.category == other.category
            && (self.summary == other.summary
                || self
                    .origin_record_ids
                    .iter()
                    .any(|id| other.origin_record_ids.contains(id)))
    }
}

/// Builder for constructing `KnowledgeBlock` instances
pub struct KnowledgeBlockBuilder {
    category: PatternCategory,
    summary: Option<String>,
    lesson: Option<String>,
    applies_to: Vec<String>,
    origin_record_ids: Vec<String>,
    governance_links: Vec<String>,
    confidence: f64,
    importance: Importance,
    timestamp: Option<DateTime<Utc>>,
}

impl KnowledgeBlockBuilder {
    pub fn new(category: PatternCategory) -> Self {
        Self {
            category,
            summary: None,
            lesson: None,
            applies_to: Vec::new(),
            origin_record_ids: Vec::new(),
            governance_links: category.governance_links().iter().map(|s| s.to_string()).collect(),
            confidence: 0.0,
            importance: Importance::Low,
            timestamp: None,
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn lesson(mut self, lesson: impl Into<String>) -> Self {
        self.lesson = Some(lesson.into());
        self
    }

    pub fn applies_to(mut self, projects: impl IntoIterator<Item = String>) -> Self {
        self.applies_to.extend(projects);
        self
    }

    pub fn origin_records(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.origin_record_ids.extend(ids);
        self
    }

    /// Set confidence (clamped to 0.0–1.0)
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Build and validate the block.
    pub fn build(self) -> Result<KnowledgeBlock> {
        let block = KnowledgeBlock {
            id: format!("kb-{}", uuid::Uuid::new_v4()),
            category: self.category,
            summary: self.summary.unwrap_or_default(),
            lesson: self.lesson.unwrap_or_default(),
            applies_to: self.applies_to,
            origin_record_ids: self.origin_record_ids,
            governance_links: self.governance_links,
            confidence: self.confidence,
            importance: self.importance,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            last_validated: None,
        };
        block.validate()?;
        Ok(block)
    }
}

/// Index entry for a record marked for archival. The record itself stays in
/// the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveReference {
    pub record_id: String,
    pub scope: Scope,
    pub key: String,
    pub score: f64,
    pub reason: String,
    pub archived_at: DateTime<Utc>,
    pub retain_until: DateTime<Utc>,
}

/// What started a consolidation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationTrigger {
    Manual,
    Periodic,
    /// Record count reached the configured threshold
    Threshold,
}

/// Summary of one consolidation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    pub trigger: ConsolidationTrigger,
    pub records_analyzed: usize,
    pub patterns: Vec<DetectedPattern>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub high_significance: usize,
    pub medium_significance: usize,
    pub low_significance: usize,
    pub blocks_created: Vec<KnowledgeBlock>,
    pub blocks_rejected: usize,
    pub records_archived: Vec<String>,
    /// Per-item failures that were skipped
    pub failures: Vec<String>,
    pub completed_at: DateTime<Utc>,
}
