//! Reasoning orchestrator: the governed decision state machine
//!
//! ```text
//! INTENT_CHECK -> DRIFT_CHECK -> LOAD -> FILTER -> MERGE -> ROUTE -> SNAPSHOT
//!   -> PLANNING_GOVERNANCE_CHECK -> PATTERN_MATCH -> RISK_ANALYSIS
//!   -> DECISION_SYNTHESIS -> ACTION_SYNTHESIS -> RESULT
//! ```
//!
//! INTENT_CHECK, DRIFT_CHECK and PLANNING_GOVERNANCE_CHECK abort with an
//! error. Every other stage only narrows or annotates the result.

use super::patterns::PatternLibrary;
use super::types::*;
use crate::config::{ConsolidationConfig, ReasoningConfig};
use crate::consolidation::{KnowledgeBlock, KnowledgeStore};
use crate::drift::{ensure_not_blocked, DriftMonitor};
use crate::error::{Error, Result};
use crate::evolution::PatternStore;
use crate::memory::{
    GovernanceRulePayload, IssuePayload, MemoryRecord, MemoryRouter, MemoryStore, RiskLevel,
    RouteFilter, Scope, ScopeKind,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

const GOVERNANCE_CONTEXT_TAGS: [&str; 4] = ["governance", "governance_rule", "policy", "enforcement"];
const FAILURE_TAGS: [&str; 5] = ["qa_failure", "failure", "build_failure", "incident", "error"];
const BLOCKER_TAGS: [&str; 2] = ["blocker", "critical"];

/// Top-level entry point producing governed decisions
pub struct ReasoningOrchestrator {
    config: ReasoningConfig,
    consolidation_trigger: usize,
    store: Arc<MemoryStore>,
    router: MemoryRouter,
    drift: Arc<DriftMonitor>,
    knowledge: Arc<KnowledgeStore>,
    patterns: Arc<PatternStore>,
}

/// Records assembled by LOAD, FILTER and MERGE
struct LoadedContext {
    records: Vec<MemoryRecord>,
    knowledge_merged: usize,
    total_records: usize,
}

impl ReasoningOrchestrator {
    pub fn new(
        config: ReasoningConfig,
        consolidation: &ConsolidationConfig,
        store: Arc<MemoryStore>,
        router: MemoryRouter,
        drift: Arc<DriftMonitor>,
        knowledge: Arc<KnowledgeStore>,
        patterns: Arc<PatternStore>,
    ) -> Self {
        Self {
            config,
            consolidation_trigger: consolidation.trigger_entry_count,
            store,
            router,
            drift,
            knowledge,
            patterns,
        }
    }

    /// Reason about `request` now.
    pub async fn reason(&self, request: &ReasoningRequest) -> Result<ReasoningResult> {
        self.reason_at(request, Utc::now()).await
    }

    /// Reason about `request` as of `now`.
    pub async fn reason_at(
        &self,
        request: &ReasoningRequest,
        now: DateTime<Utc>,
    ) -> Result<ReasoningResult> {
        let mut stages = vec![ReasoningStage::IntentCheck];
        let mut warnings = Vec::new();
        self.check_intent(request)?;

        // One read of the store serves every later stage
        let snapshot = self.store.snapshot().await;

        let drift_status = if request.skip_drift_check {
            warnings.push("Drift pre-check skipped by request".to_string());
            None
        } else {
            stages.push(ReasoningStage::DriftCheck);
            let report = self.drift.check_at(&snapshot, now);
            ensure_not_blocked(&report)?;
            Some(report.overall_status)
        };

        stages.extend([ReasoningStage::Load, ReasoningStage::Filter, ReasoningStage::Merge]);
        let loaded = self.load_context(request, &snapshot.records).await;

        stages.push(ReasoningStage::Route);
        let risk = request.risk();
        let filter = RouteFilter {
            intent: self
                .router
                .scopes_for_intent(&request.intent_key())
                .map(|_| request.intent_key()),
            phase: request.phase.clone(),
            subsystem: request.subsystem.clone(),
            risk_level: Some(risk),
            max_results: request.max_results,
            ..Default::default()
        };
        let routed = self.router.route(&loaded.records, &filter);

        stages.push(ReasoningStage::Snapshot);
        let context = self.router.is_context_sufficient(routed.records.len(), risk);
        if let Some(warning) = &context.warning {
            warnings.push(warning.clone());
        }
        let consolidation_recommended = loaded.total_records >= self.consolidation_trigger;
        if consolidation_recommended {
            tracing::info!(
                records = loaded.total_records,
                threshold = self.consolidation_trigger,
                "Consolidation threshold reached"
            );
        }

        stages.push(ReasoningStage::PlanningGovernanceCheck);
        let strict_rules = self.check_planning_governance(request, &loaded.records)?;
        let has_governance_context = loaded
            .records
            .iter()
            .any(|r| r.has_any_tag(&GOVERNANCE_CONTEXT_TAGS));
        if risk >= RiskLevel::High && !has_governance_context {
            warnings.push(format!(
                "No governance context loaded for a {} risk request",
                risk
            ));
        }

        stages.push(ReasoningStage::PatternMatch);
        let library = PatternLibrary::load(&snapshot.records, &self.patterns).await;
        let matched = library.match_patterns(&context_tags(request), risk);

        stages.push(ReasoningStage::RiskAnalysis);
        let risk_analysis = self.analyze_risk(request, &loaded.records, strict_rules, now);

        stages.push(ReasoningStage::DecisionSynthesis);
        let confidence = if matched.is_empty() {
            0.5
        } else {
            matched.iter().map(|m| m.confidence.bucket_value()).sum::<f64>() / matched.len() as f64
        };
        let decision = if risk_analysis.assessed == RiskLevel::Critical
            && (risk_analysis.open_blockers > 0 || !context.sufficient)
        {
            Decision::Block
        } else if risk_analysis.assessed >= RiskLevel::High
            || risk_analysis.recent_failures > 0
            || !warnings.is_empty()
        {
            Decision::ProceedWithCaution
        } else {
            Decision::Proceed
        };

        stages.push(ReasoningStage::ActionSynthesis);
        let recommended_actions = synthesize_actions(
            decision,
            &matched,
            &risk_analysis,
            &context,
            consolidation_recommended.then_some(loaded.total_records),
        );

        stages.push(ReasoningStage::Result);
        tracing::info!(
            intent = %request.intent,
            decision = ?decision,
            risk = %risk_analysis.assessed,
            patterns = matched.len(),
            context = routed.records.len(),
            "Reasoning complete"
        );

        Ok(ReasoningResult {
            intent: request.intent.clone(),
            decision,
            confidence,
            risk: risk_analysis,
            matched_patterns: matched,
            recommended_actions,
            warnings,
            context_record_ids: routed.records.iter().map(|r| r.id.clone()).collect(),
            knowledge_blocks_merged: loaded.knowledge_merged,
            context,
            filtering_reason: routed.filtering_reason,
            consolidation_recommended,
            drift_status,
            stages,
            generated_at: now,
        })
    }

    // =========================================================================
    // Gates
    // =========================================================================

    fn check_intent(&self, request: &ReasoningRequest) -> Result<()> {
        if request.skip_memory {
            return Err(Error::Governance {
                reason: "request asks to act without loading memory".to_string(),
                recommendation: "Load memory before acting; memory-before-action is mandatory"
                    .to_string(),
            });
        }

        let text = format!(
            "{} {}",
            request.intent,
            request.description.as_deref().unwrap_or_default()
        )
        .to_lowercase()
        .replace(['_', '-'], " ");
        if let Some(phrase) = self
            .config
            .forbidden_intents
            .iter()
            .find(|p| text.contains(p.to_lowercase().as_str()))
        {
            tracing::warn!(intent = %request.intent, phrase = %phrase, "Forbidden intent rejected");
            return Err(Error::Governance {
                reason: format!("intent '{}' matches forbidden phrase '{}'", request.intent, phrase),
                recommendation: "Rephrase the request without bypassing governance controls"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Abort when a mandatory rule forbids a requested tag. Returns the
    /// number of mandatory rules in context.
    fn check_planning_governance(
        &self,
        request: &ReasoningRequest,
        records: &[MemoryRecord],
    ) -> Result<usize> {
        let requested: BTreeSet<String> =
            request.tags.iter().map(|t| t.to_ascii_lowercase()).collect();
        let mut strict = 0;
        for record in records.iter().filter(|r| r.has_tag("governance_rule")) {
            let Ok(rule) = serde_json::from_value::<GovernanceRulePayload>(record.value.clone())
            else {
                continue;
            };
            if !rule.is_mandatory() {
                continue;
            }
            strict += 1;
            if let Some(tag) = rule
                .forbids
                .iter()
                .find(|f| requested.contains(&f.to_ascii_lowercase()))
            {
                return Err(Error::Governance {
                    reason: format!("mandatory rule '{}' forbids '{}'", rule.rule, tag),
                    recommendation: format!(
                        "Remove '{}' from the request or amend rule {} through review",
                        tag, record.id
                    ),
                });
            }
        }
        Ok(strict)
    }

    // =========================================================================
    // Context assembly
    // =========================================================================

    /// Select the request's scopes from `all_records`, drop retired records
    /// and merge confident knowledge blocks.
    async fn load_context(
        &self,
        request: &ReasoningRequest,
        all_records: &[MemoryRecord],
    ) -> LoadedContext {
        let scopes: Vec<ScopeKind> = self
            .router
            .scopes_for_intent(&request.intent_key())
            .map(<[ScopeKind]>::to_vec)
            .unwrap_or_else(|| vec![ScopeKind::Project, ScopeKind::Global, ScopeKind::Agent]);

        let mut records = Vec::new();
        for kind in scopes {
            let scope = match kind {
                ScopeKind::Global => Scope::Global,
                ScopeKind::Agent => Scope::Agent,
                ScopeKind::Project => match request.project_id.as_deref() {
                    Some(id) if !id.is_empty() => Scope::project(id),
                    _ => continue,
                },
            };
            let mut in_scope: Vec<MemoryRecord> =
                all_records.iter().filter(|r| r.scope == scope).cloned().collect();
            in_scope.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            records.extend(in_scope);
        }
        let total_records = all_records.len();

        records.retain(|r| !r.is_retired());

        let blocks: Vec<KnowledgeBlock> = self
            .knowledge
            .all()
            .await
            .into_iter()
            .filter(|b| b.confidence >= self.config.knowledge_min_confidence)
            .collect();
        let knowledge_merged = blocks.len();
        records.extend(blocks.iter().map(knowledge_record));

        tracing::debug!(
            records = records.len(),
            knowledge = knowledge_merged,
            "Reasoning context loaded"
        );
        LoadedContext {
            records,
            knowledge_merged,
            total_records,
        }
    }

    fn analyze_risk(
        &self,
        request: &ReasoningRequest,
        records: &[MemoryRecord],
        strict_rules: usize,
        now: DateTime<Utc>,
    ) -> RiskAnalysis {
        let window_start = now - Duration::hours(self.config.failure_window_hours);
        let recent_failures = records
            .iter()
            .filter(|r| r.has_any_tag(&FAILURE_TAGS) && r.created_at >= window_start)
            .count();
        let open_blockers = records.iter().filter(|r| is_open_blocker(r)).count();

        let requested = request.risk();
        let mut assessed = requested;
        let mut factors = Vec::new();
        if open_blockers > 0 {
            assessed = assessed.max(RiskLevel::High);
            factors.push(format!("{} open blocker issue(s)", open_blockers));
        }
        if recent_failures > 0 {
            factors.push(format!(
                "{} failure(s) in the last {}h",
                recent_failures, self.config.failure_window_hours
            ));
        }
        if recent_failures >= 3 {
            assessed = raise(assessed);
        }
        if strict_rules > 0 {
            factors.push(format!("{} mandatory governance rule(s) apply", strict_rules));
        }

        RiskAnalysis {
            requested,
            assessed,
            recent_failures,
            open_blockers,
            strict_rules,
            factors,
        }
    }
}

fn raise(level: RiskLevel) -> RiskLevel {
    match level {
        RiskLevel::Low => RiskLevel::Medium,
        RiskLevel::Medium => RiskLevel::High,
        RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
    }
}

fn is_open_blocker(record: &MemoryRecord) -> bool {
    if !record.has_tag("issue") {
        return false;
    }
    let Ok(issue) = serde_json::from_value::<IssuePayload>(record.value.clone()) else {
        return false;
    };
    let severe = record.has_any_tag(&BLOCKER_TAGS)
        || issue
            .severity
            .as_deref()
            .is_some_and(|s| BLOCKER_TAGS.contains(&s.to_ascii_lowercase().as_str()));
    severe && issue.is_open()
}

/// Tags describing the request for pattern matching
fn context_tags(request: &ReasoningRequest) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = request.tags.iter().map(|t| t.to_ascii_lowercase()).collect();
    tags.insert(request.intent_key());
    tags.extend(request.phase.iter().map(|p| p.to_ascii_lowercase()));
    tags.extend(request.subsystem.iter().map(|s| s.to_ascii_lowercase()));
    tags
}

/// A knowledge block presented as a synthetic global record
fn knowledge_record(block: &KnowledgeBlock) -> MemoryRecord {
    MemoryRecord {
        id: block.id.clone(),
        scope: Scope::Global,
        key: format!("knowledge/{}", block.category),
        value: json!({
            "summary": block.summary,
            "lesson": block.lesson,
            "appliesTo": block.applies_to,
            "governanceLinks": block.governance_links,
            "confidence": block.confidence,
        }),
        tags: ["knowledge_block", block.category.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        created_at: block.timestamp,
        updated_at: block.last_validated.unwrap_or(block.timestamp),
        created_by: "consolidation".to_string(),
        version: Some(1),
    }
}

fn synthesize_actions(
    decision: Decision,
    matched: &[MatchedPattern],
    risk: &RiskAnalysis,
    context: &crate::memory::ContextSufficiency,
    consolidation_due: Option<usize>,
) -> Vec<String> {
    let mut actions = Vec::new();
    if decision == Decision::Block {
        actions.push(format!(
            "Do not proceed: {} risk with {}",
            risk.assessed,
            if risk.open_blockers > 0 {
                "open blocker issues"
            } else {
                "insufficient context"
            }
        ));
    }
    if risk.open_blockers > 0 {
        actions.push(format!("Resolve {} open blocker issue(s) first", risk.open_blockers));
    }
    if risk.recent_failures > 0 {
        actions.push(format!(
            "Review the {} recent failure(s) before proceeding",
            risk.recent_failures
        ));
    }
    if risk.strict_rules > 0 {
        actions.push(format!(
            "Confirm compliance with {} mandatory governance rule(s)",
            risk.strict_rules
        ));
    }
    if !context.sufficient {
        actions.push(format!(
            "Gather more context: {} of {} expected records available",
            context.actual, context.required
        ));
    }
    for pattern in matched {
        actions.push(format!("{}: {}", pattern.name, pattern.approach));
    }
    if let Some(count) = consolidation_due {
        actions.push(format!(
            "Run a consolidation cycle: {} records reached the trigger threshold",
            count
        ));
    }
    actions
}
