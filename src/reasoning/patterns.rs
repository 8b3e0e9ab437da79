//! Pattern library: built-in, learned and evolved reasoning patterns

use super::types::{MatchedPattern, PatternSource};
use crate::evolution::{
    ConfidenceLevel, ConsolidatedPatternSet, PatternClass, PatternStore, ReasoningPattern,
};
use crate::memory::{MemoryRecord, RiskLevel};
use std::collections::{BTreeMap, BTreeSet};

const PATTERN_TAGS: [&str; 2] = ["reasoning_pattern", "pattern"];

#[allow(clippy::too_many_arguments)]
fn builtin(
    id: &str,
    name: &str,
    description: &str,
    context: &str,
    approach: &str,
    tags: &[&str],
    confidence: ConfidenceLevel,
    core: bool,
) -> ReasoningPattern {
    ReasoningPattern {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        context: context.to_string(),
        approach: approach.to_string(),
        examples: Vec::new(),
        tags: tags.iter().map(|s| s.to_string()).collect(),
        success_rate: None,
        usage_count: None,
        performance_score: None,
        immutable: core,
        confidence,
        core,
        last_evolved: None,
    }
}

/// Patterns shipped with the crate. Core patterns are immutable.
pub fn builtin_patterns() -> Vec<ReasoningPattern> {
    use ConfidenceLevel::*;
    vec![
        builtin(
            "governance-first",
            "Governance first",
            "Check governance rules before planning any change",
            "Every plan, especially high-risk ones",
            "Load governance rules, confirm the plan complies, then proceed",
            &["governance", "planning", "policy"],
            High,
            true,
        ),
        builtin(
            "qa-gate-mandatory",
            "QA gate is mandatory",
            "No change merges or deploys without passing the QA gate",
            "Merges, releases and deployments",
            "Run the full QA gate and treat any failure as blocking",
            &["qa", "testing", "qa_failure", "deployment", "release"],
            High,
            true,
        ),
        builtin(
            "memory-before-action",
            "Memory before action",
            "Consult stored memory before acting",
            "Every request",
            "Load project, global and agent memory relevant to the intent first",
            &["memory", "planning", "governance"],
            High,
            true,
        ),
        builtin(
            "root-cause-first",
            "Root cause first",
            "Fix the cause of a defect rather than its symptom",
            "Bug fixes and recurring failures",
            "Reproduce, locate the root cause, add a regression test, then fix",
            &["bug_fix", "bug", "issue", "error", "qa_failure"],
            Medium,
            false,
        ),
        builtin(
            "incremental-delivery",
            "Incremental delivery",
            "Deliver features in small, reviewable steps",
            "Feature work and large implementations",
            "Split the change, land each step behind tests, review between steps",
            &["feature", "implementation", "refactor"],
            Medium,
            false,
        ),
        builtin(
            "rollback-ready",
            "Rollback ready",
            "Every deployment has a tested way back",
            "Deployments and infrastructure changes",
            "Prepare and verify the rollback path before rolling out",
            &["deployment", "release", "infrastructure"],
            High,
            false,
        ),
        builtin(
            "decision-record",
            "Record architecture decisions",
            "Significant design choices are written down with their alternatives",
            "Architecture changes and refactors",
            "Write an architecture decision record and check it against existing ones",
            &["architecture", "architecture_decision", "refactor", "planning"],
            Medium,
            false,
        ),
    ]
}

/// Library entry with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryPattern {
    pub pattern: ReasoningPattern,
    pub source: PatternSource,
}

/// Assembled pattern library, ordered by id
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    patterns: Vec<LibraryPattern>,
}

impl PatternLibrary {
    /// Assemble built-ins, learned patterns and the evolved set.
    ///
    /// Learned patterns replace built-ins by id, except immutable ones. The
    /// evolved set only contributes scores: `performance_score`,
    /// `usage_count`, `success_rate` and `last_evolved` are copied onto
    /// mutable patterns that still have a built-in or learned source.
    /// Evolved entries without a source are dropped.
    pub fn assemble(
        builtins: Vec<ReasoningPattern>,
        learned: Vec<ReasoningPattern>,
        evolved: Option<&ConsolidatedPatternSet>,
    ) -> Self {
        let mut by_id: BTreeMap<String, LibraryPattern> = BTreeMap::new();
        let mut add = |pattern: ReasoningPattern, source: PatternSource| {
            if by_id.get(&pattern.id).is_some_and(|p| p.pattern.immutable) {
                return;
            }
            by_id.insert(pattern.id.clone(), LibraryPattern { pattern, source });
        };

        for p in builtins {
            add(p, PatternSource::BuiltIn);
        }
        for p in learned {
            add(p, PatternSource::Learned);
        }

        if let Some(set) = evolved {
            for scored in set.all() {
                let Some(entry) = by_id.get_mut(&scored.id) else {
                    tracing::debug!(pattern = %scored.id, "Dropping evolved pattern without a source");
                    continue;
                };
                if entry.pattern.immutable || scored.performance_score.is_none() {
                    continue;
                }
                entry.pattern.performance_score = scored.performance_score;
                entry.pattern.usage_count = scored.usage_count;
                entry.pattern.success_rate = scored.success_rate;
                entry.pattern.last_evolved = scored.last_evolved;
                entry.source = PatternSource::Evolved;
            }
        }

        Self {
            patterns: by_id.into_values().collect(),
        }
    }

    /// Learned patterns from active `reasoning_pattern` records.
    pub fn learned_from(records: &[MemoryRecord]) -> Vec<ReasoningPattern> {
        let mut learned: Vec<ReasoningPattern> = records
            .iter()
            .filter(|r| r.has_any_tag(&PATTERN_TAGS) && !r.is_retired())
            .filter_map(|r| {
                let pattern = ReasoningPattern::from_record(r);
                if pattern.is_none() {
                    tracing::debug!(id = %r.id, "Skipping unparseable reasoning pattern record");
                }
                pattern
            })
            .collect();
        learned.sort_by(|a, b| a.id.cmp(&b.id));
        learned
    }

    /// Build the library from the record set and the stored evolved set.
    pub async fn load(records: &[MemoryRecord], store: &PatternStore) -> Self {
        let evolved = match store.load().await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!("Failed to load evolved patterns: {}", e);
                None
            }
        };
        Self::assemble(builtin_patterns(), Self::learned_from(records), evolved.as_ref())
    }

    pub fn patterns(&self) -> &[LibraryPattern] {
        &self.patterns
    }

    pub fn get(&self, id: &str) -> Option<&LibraryPattern> {
        self.patterns.iter().find(|p| p.pattern.id == id)
    }

    /// All patterns, for feeding an evolution cycle.
    pub fn to_patterns(&self) -> Vec<ReasoningPattern> {
        self.patterns.iter().map(|p| p.pattern.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns applicable to `context_tags` at `risk`, ordered by id.
    ///
    /// Retirement candidates are skipped unless immutable. At high risk and
    /// above every core pattern is included.
    pub fn match_patterns(
        &self,
        context_tags: &BTreeSet<String>,
        risk: RiskLevel,
    ) -> Vec<MatchedPattern> {
        let force_core = risk >= RiskLevel::High;
        self.patterns
            .iter()
            .filter(|lp| lp.pattern.immutable || lp.pattern.class() != PatternClass::RetirementCandidate)
            .filter_map(|lp| {
                let p = &lp.pattern;
                let shared: Vec<&str> = p
                    .tags
                    .iter()
                    .filter(|t| context_tags.contains(t.as_str()))
                    .map(String::as_str)
                    .collect();
                let reason = if !shared.is_empty() {
                    format!("matches tags [{}]", shared.join(", "))
                } else if force_core && p.core {
                    format!("core pattern required at {} risk", risk)
                } else {
                    return None;
                };
                Some(MatchedPattern {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    approach: p.approach.clone(),
                    confidence: p.confidence,
                    class: p.class(),
                    source: lp.source,
                    reason,
                })
            })
            .collect()
    }
}
