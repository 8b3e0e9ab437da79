//! Usage metrics and performance scoring

use super::types::PatternMetrics;
use crate::config::EvolutionConfig;
use crate::memory::{MemoryRecord, UsagePayload};
use std::collections::BTreeMap;

pub const WEIGHT_SUCCESS: f64 = 0.30;
pub const WEIGHT_RELEVANCE: f64 = 0.15;
pub const WEIGHT_QA_ESCAPE: f64 = -0.25;
pub const WEIGHT_CONFLICTS: f64 = -0.10;
pub const WEIGHT_BUILDER_CONSISTENCY: f64 = 0.20;
pub const WEIGHT_DRIFT_STABILITY: f64 = 0.10;

const USAGE_TAG: &str = "pattern_usage";

/// Group `pattern_usage` records by the pattern they reference.
///
/// Retired records and malformed payloads are skipped. Returns
/// `(record id, payload)` pairs per pattern id, in record id order.
pub fn usage_by_pattern(records: &[MemoryRecord]) -> BTreeMap<String, Vec<(String, UsagePayload)>> {
    let mut sorted: Vec<&MemoryRecord> = records
        .iter()
        .filter(|r| r.has_tag(USAGE_TAG) && !r.is_retired())
        .collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out: BTreeMap<String, Vec<(String, UsagePayload)>> = BTreeMap::new();
    for record in sorted {
        let usage: UsagePayload = match serde_json::from_value(record.value.clone()) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("Skipping malformed usage record {}: {}", record.id, e);
                continue;
            }
        };
        let Some(pattern_id) = usage.referenced_pattern().map(str::to_string) else {
            tracing::debug!(id = %record.id, "Usage record references no pattern");
            continue;
        };
        out.entry(pattern_id)
            .or_default()
            .push((record.id.clone(), usage));
    }
    out
}

impl PatternMetrics {
    /// Aggregate usage observations of one pattern.
    pub fn from_usages(
        pattern_id: &str,
        usages: &[(String, UsagePayload)],
        config: &EvolutionConfig,
    ) -> Self {
        let n = usages.len();
        let rate = |f: fn(&UsagePayload) -> bool| {
            if n == 0 {
                0.0
            } else {
                usages.iter().filter(|(_, u)| f(u)).count() as f64 / n as f64
            }
        };

        let mut evidence: Vec<String> = usages.iter().map(|(id, _)| id.clone()).collect();
        evidence.sort();

        Self {
            pattern_id: pattern_id.to_string(),
            usage_count: n,
            success_rate: rate(|u| u.success),
            relevance: ratio(n, config.relevance_ceiling),
            qa_failure_escape_rate: rate(|u| u.qa_failure_escaped),
            architecture_conflicts: usages.iter().filter(|(_, u)| u.architecture_conflict).count(),
            builder_consistency: rate(|u| u.builder_consistent),
            drift_stability: rate(|u| u.drift_stable),
            evidence,
        }
    }

    /// Weighted performance score clamped to `[0, 1]`.
    pub fn score(&self, config: &EvolutionConfig) -> f64 {
        let raw = WEIGHT_SUCCESS * self.success_rate
            + WEIGHT_RELEVANCE * self.relevance
            + WEIGHT_QA_ESCAPE * self.qa_failure_escape_rate
            + WEIGHT_CONFLICTS * ratio(self.architecture_conflicts, config.conflict_ceiling)
            + WEIGHT_BUILDER_CONSISTENCY * self.builder_consistency
            + WEIGHT_DRIFT_STABILITY * self.drift_stability;
        raw.clamp(0.0, 1.0)
    }
}

fn ratio(count: usize, ceiling: usize) -> f64 {
    if ceiling == 0 {
        return 1.0;
    }
    (count as f64 / ceiling as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Scope;
    use chrono::Utc;
    use serde_json::json;

    fn metrics(success: f64, escape: f64, usage: usize, conflicts: usize) -> PatternMetrics {
        PatternMetrics {
            pattern_id: "p".to_string(),
            usage_count: usage,
            success_rate: success,
            relevance: ratio(usage, 100),
            qa_failure_escape_rate: escape,
            architecture_conflicts: conflicts,
            builder_consistency: 1.0,
            drift_stability: 1.0,
            evidence: vec![],
        }
    }

    #[test]
    fn test_failing_pattern_scores_low() {
        let config = EvolutionConfig::default();
        let score = metrics(0.0, 1.0, 10, 0).score(&config);
        assert!(score < 0.4, "score was {}", score);
    }

    #[test]
    fn test_score_is_clamped() {
        let config = EvolutionConfig::default();
        let best = metrics(1.0, 0.0, 500, 0).score(&config);
        assert!((best - 0.75).abs() < 1e-9);

        let mut worst = metrics(0.0, 1.0, 0, 50);
        worst.builder_consistency = 0.0;
        worst.drift_stability = 0.0;
        assert_eq!(worst.score(&config), 0.0);
    }

    #[test]
    fn test_usage_grouping_and_rates() {
        let usage = |id: &str, value: serde_json::Value| {
            let mut r = MemoryRecord::new(Scope::Agent, id, value, ["pattern_usage"], "t", Utc::now());
            r.id = id.to_string();
            r
        };
        let records = vec![
            usage("u2", json!({"patternId": "p1", "success": false, "qaFailureEscaped": true})),
            usage("u1", json!({"patternId": "p1", "success": true})),
            usage("u3", json!({"metadata": {"patternId": "p2"}, "success": true})),
            usage("u4", json!({"success": "yes"})),
        ];
        let grouped = usage_by_pattern(&records);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["p1"][0].0, "u1");

        let m = PatternMetrics::from_usages("p1", &grouped["p1"], &EvolutionConfig::default());
        assert_eq!(m.usage_count, 2);
        assert_eq!(m.success_rate, 0.5);
        assert_eq!(m.qa_failure_escape_rate, 0.5);
        assert_eq!(m.builder_consistency, 1.0);
        assert_eq!(m.evidence, vec!["u1", "u2"]);
    }
}
