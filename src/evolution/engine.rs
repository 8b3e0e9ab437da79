//! Pattern evolution: rescoring reasoning patterns from observed usage

use super::event_log::{evidence_digest, EventLog};
use super::metrics::usage_by_pattern;
use super::pattern_store::PatternStore;
use super::types::*;
use crate::config::EvolutionConfig;
use crate::error::Result;
use crate::memory::{MemoryRecord, MemoryStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Rescores patterns, persists the classified set and audits every change
pub struct EvolutionEngine {
    config: EvolutionConfig,
    patterns: Arc<PatternStore>,
    events: Arc<EventLog>,
}

impl EvolutionEngine {
    pub fn new(config: EvolutionConfig, patterns: Arc<PatternStore>, events: Arc<EventLog>) -> Self {
        Self {
            config,
            patterns,
            events,
        }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Metrics for every pattern with enough usage records.
    pub fn collect_metrics(&self, records: &[MemoryRecord]) -> BTreeMap<String, PatternMetrics> {
        usage_by_pattern(records)
            .into_iter()
            .filter(|(_, usages)| usages.len() >= self.config.min_usage_count)
            .map(|(id, usages)| {
                let metrics = PatternMetrics::from_usages(&id, &usages, &self.config);
                (id, metrics)
            })
            .collect()
    }

    /// Proposal confidence derived from usage volume
    pub fn proposal_confidence(usage_count: usize) -> f64 {
        if usage_count >= 10 {
            0.9
        } else {
            0.6
        }
    }

    /// Propose a new score for `pattern`.
    ///
    /// Returns `None` for immutable patterns, insufficient usage, a score
    /// change below the minimum delta, or a confidence below the minimum.
    pub fn propose(
        &self,
        pattern: &ReasoningPattern,
        metrics: &PatternMetrics,
    ) -> Option<EvolutionProposal> {
        if pattern.immutable || metrics.usage_count < self.config.min_usage_count {
            return None;
        }
        let proposed = metrics.score(&self.config);
        if let Some(previous) = pattern.performance_score {
            if (proposed - previous).abs() < self.config.min_score_delta {
                return None;
            }
        }
        let confidence = Self::proposal_confidence(metrics.usage_count);
        if confidence < self.config.min_confidence {
            tracing::debug!(pattern = %pattern.id, confidence, "Discarded low-confidence proposal");
            return None;
        }

        let reason = match pattern.performance_score {
            Some(previous) => format!(
                "score {:.2} -> {:.2} over {} uses (success rate {:.2})",
                previous, proposed, metrics.usage_count, metrics.success_rate
            ),
            None => format!(
                "initial score {:.2} over {} uses (success rate {:.2})",
                proposed, metrics.usage_count, metrics.success_rate
            ),
        };
        Some(EvolutionProposal {
            pattern_id: pattern.id.clone(),
            previous_score: pattern.performance_score,
            proposed_score: proposed,
            usage_count: metrics.usage_count,
            success_rate: metrics.success_rate,
            confidence,
            evidence: metrics.evidence.clone(),
            reason,
        })
    }

    /// Apply a proposal. Only the score, usage and success fields change.
    pub fn apply(
        pattern: &ReasoningPattern,
        proposal: &EvolutionProposal,
        now: DateTime<Utc>,
    ) -> ReasoningPattern {
        let mut evolved = pattern.clone();
        evolved.performance_score = Some(proposal.proposed_score.clamp(0.0, 1.0));
        evolved.usage_count = Some(proposal.usage_count as u64);
        evolved.success_rate = Some(proposal.success_rate);
        evolved.last_evolved = Some(now);
        evolved
    }

    /// Run an evolution cycle over `patterns`.
    pub async fn run(
        &self,
        store: &MemoryStore,
        patterns: Vec<ReasoningPattern>,
    ) -> Result<EvolutionReport> {
        self.run_at(store, patterns, Utc::now()).await
    }

    /// Run an evolution cycle as of `now`.
    ///
    /// Every pattern ends up in the saved set; unchanged patterns keep their
    /// previous score.
    pub async fn run_at(
        &self,
        store: &MemoryStore,
        mut patterns: Vec<ReasoningPattern>,
        now: DateTime<Utc>,
    ) -> Result<EvolutionReport> {
        patterns.sort_by(|a, b| a.id.cmp(&b.id));
        patterns.dedup_by(|a, b| a.id == b.id);

        let records = store.all_records().await;
        let metrics = self.collect_metrics(&records);
        tracing::info!(
            patterns = patterns.len(),
            scored = metrics.len(),
            "Evolution cycle started"
        );

        let mut generated = 0;
        let mut discarded = 0;
        let mut skipped_immutable = 0;
        let mut events = Vec::new();
        let mut evolved = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            if pattern.immutable {
                skipped_immutable += 1;
                evolved.push(pattern);
                continue;
            }
            let Some(m) = metrics.get(&pattern.id) else {
                evolved.push(pattern);
                continue;
            };
            let score = m.score(&self.config);
            let changed = pattern
                .performance_score
                .map_or(true, |prev| (score - prev).abs() >= self.config.min_score_delta);
            if changed {
                generated += 1;
            }
            match self.propose(&pattern, m) {
                Some(proposal) => {
                    let next = Self::apply(&pattern, &proposal, now);
                    events.push(EvolutionEvent {
                        id: format!("evt-{}", uuid::Uuid::new_v4()),
                        pattern_id: proposal.pattern_id.clone(),
                        previous_score: proposal.previous_score,
                        new_score: proposal.proposed_score,
                        classification: next.class(),
                        confidence: proposal.confidence,
                        reason: proposal.reason.clone(),
                        evidence_digest: evidence_digest(&proposal.evidence),
                        evidence: proposal.evidence,
                        applied_at: now,
                    });
                    tracing::info!(
                        pattern = %next.id,
                        class = %next.class(),
                        "Pattern evolved"
                    );
                    evolved.push(next);
                }
                None => {
                    if changed {
                        discarded += 1;
                    }
                    evolved.push(pattern);
                }
            }
        }

        let set = ConsolidatedPatternSet::from_patterns(evolved, now);
        self.patterns.save(&set).await?;

        let mut failures = Vec::new();
        if let Err(e) = self.events.append(&events).await {
            tracing::warn!("Failed to record governance events: {}", e);
            failures.push(format!("event log: {}", e));
        }

        Ok(EvolutionReport {
            patterns_evaluated: set.total_patterns,
            proposals_generated: generated,
            proposals_applied: events.len(),
            proposals_discarded: discarded,
            skipped_immutable,
            stable_patterns: set.stable_patterns,
            monitored_patterns: set.monitored_patterns,
            retirement_candidates: set.retirement_candidates,
            events,
            failures,
            completed_at: now,
        })
    }
}
