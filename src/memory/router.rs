//! Memory routing based on intent, phase, subsystem and risk
//!
//! Routing is a pure function over an immutable slice of records. Each
//! filtering step appends a reason so the selection can be audited.

use super::record::{MemoryRecord, ScopeKind};
use crate::config::RouterConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Risk tier of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(crate::error::Error::Config(format!(
                "Unknown risk level: {}",
                other
            ))),
        }
    }
}

/// Routing criteria. Empty lists and `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFilter {
    #[serde(default)]
    pub scope: Vec<ScopeKind>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub subsystem: Option<String>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Routing outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub records: Vec<MemoryRecord>,
    /// Step-by-step explanation, joined with "; "
    pub filtering_reason: String,
}

/// Outcome of the minimum-context check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSufficiency {
    pub sufficient: bool,
    pub required: usize,
    pub actual: usize,
    /// Non-fatal warning when insufficient
    pub warning: Option<String>,
}

/// Deterministic rule-table-driven record selector
#[derive(Debug, Clone)]
pub struct MemoryRouter {
    config: RouterConfig,
}

impl MemoryRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Scopes the intent table recommends loading for `intent`.
    pub fn scopes_for_intent(&self, intent: &str) -> Option<&[ScopeKind]> {
        self.config
            .intents
            .get(intent)
            .map(|rule| rule.scopes.as_slice())
    }

    /// Select the records relevant to `filter`.
    pub fn route(&self, records: &[MemoryRecord], filter: &RouteFilter) -> RouteResult {
        let mut reasons = Vec::new();
        let mut selected: Vec<&MemoryRecord> = records.iter().collect();

        if !filter.scope.is_empty() {
            selected.retain(|r| filter.scope.contains(&r.scope.kind()));
            reasons.push(format!(
                "scope [{}]: {} records",
                join(filter.scope.iter().map(|s| s.as_str())),
                selected.len()
            ));
        }

        if let Some(intent) = &filter.intent {
            match self.config.intents.get(intent) {
                Some(rule) => {
                    selected.retain(|r| {
                        rule.scopes.contains(&r.scope.kind()) && r.has_any_tag(&rule.tags)
                    });
                    reasons.push(format!("intent '{}': {} records", intent, selected.len()));
                }
                None => reasons.push(format!("intent '{}' unknown, not applied", intent)),
            }
        }

        if let Some(phase) = &filter.phase {
            match self.config.phases.get(phase) {
                Some(tags) => {
                    selected.retain(|r| r.has_any_tag(tags));
                    reasons.push(format!("phase '{}': {} records", phase, selected.len()));
                }
                None => reasons.push(format!("phase '{}' unknown, not applied", phase)),
            }
        }

        if let Some(subsystem) = &filter.subsystem {
            match self.config.subsystems.get(subsystem) {
                Some(tags) => {
                    selected.retain(|r| r.has_any_tag(tags));
                    reasons.push(format!(
                        "subsystem '{}': {} records",
                        subsystem,
                        selected.len()
                    ));
                }
                None => reasons.push(format!("subsystem '{}' unknown, not applied", subsystem)),
            }
        }

        if !filter.tags.is_empty() {
            selected.retain(|r| r.has_any_tag(&filter.tags));
            reasons.push(format!(
                "tags [{}]: {} records",
                join(filter.tags.iter().map(String::as_str)),
                selected.len()
            ));
        }

        selected.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        reasons.push("sorted by createdAt descending".to_string());

        if let Some(risk) = filter.risk_level {
            let priority = &self.config.priority_tags;
            let (mut first, rest): (Vec<_>, Vec<_>) =
                selected.into_iter().partition(|r| r.has_any_tag(priority));
            let prioritized = first.len();
            first.extend(rest);
            selected = first;

            let cap = self.config.risk_caps.get(risk);
            selected.truncate(cap);
            reasons.push(format!(
                "risk '{}': {} priority records first, capped at {} -> {} records",
                risk,
                prioritized,
                cap,
                selected.len()
            ));
        }

        if let Some(max) = filter.max_results {
            selected.truncate(max);
            reasons.push(format!("maxResults {} -> {} records", max, selected.len()));
        }

        RouteResult {
            records: selected.into_iter().cloned().collect(),
            filtering_reason: reasons.join("; "),
        }
    }

    /// Check that `count` records are enough context for `risk`.
    pub fn is_context_sufficient(&self, count: usize, risk: RiskLevel) -> ContextSufficiency {
        let required = self.config.min_context.get(risk);
        let sufficient = count >= required;
        let warning = (!sufficient).then(|| {
            format!(
                "Insufficient context for {} risk: {} records loaded, at least {} expected",
                risk, count, required
            )
        });
        ContextSufficiency {
            sufficient,
            required,
            actual: count,
            warning,
        }
    }
}

impl Default for MemoryRouter {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::record::Scope;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn record_at(scope: Scope, tags: &[&str], minutes: i64) -> MemoryRecord {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        MemoryRecord::new(
            scope,
            format!("k{}", minutes),
            json!({"description": format!("record {}", minutes)}),
            tags.iter().copied(),
            "test",
            base + Duration::minutes(minutes),
        )
    }

    #[test]
    fn test_low_risk_caps_at_ten_most_recent_first() {
        let router = MemoryRouter::default();
        let records: Vec<_> = (0..50).map(|i| record_at(Scope::Global, &["note"], i)).collect();

        let result = router.route(
            &records,
            &RouteFilter {
                risk_level: Some(RiskLevel::Low),
                ..Default::default()
            },
        );
        assert_eq!(result.records.len(), 10);
        assert_eq!(result.records[0].key, "k49");
        assert_eq!(result.records[9].key, "k40");
        assert!(result.filtering_reason.contains("risk 'low'"));
    }

    #[test]
    fn test_priority_tags_float_first() {
        let router = MemoryRouter::default();
        let records = vec![
            record_at(Scope::Global, &["note"], 10),
            record_at(Scope::Global, &["governance"], 1),
            record_at(Scope::Global, &["note"], 5),
        ];
        let result = router.route(
            &records,
            &RouteFilter {
                risk_level: Some(RiskLevel::High),
                ..Default::default()
            },
        );
        let keys: Vec<_> = result.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["k1", "k10", "k5"]);
    }

    #[test]
    fn test_intent_narrows_scope_and_tags() {
        let router = MemoryRouter::default();
        let records = vec![
            record_at(Scope::project("alpha"), &["bug"], 1),
            record_at(Scope::Agent, &["bug"], 2),
            record_at(Scope::Global, &["frontend"], 3),
        ];
        let result = router.route(
            &records,
            &RouteFilter {
                intent: Some("bug_fix".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].key, "k1");
    }

    #[test]
    fn test_phase_subsystem_and_tags_compose() {
        let router = MemoryRouter::default();
        let records = vec![
            record_at(Scope::Global, &["qa", "frontend"], 1),
            record_at(Scope::Global, &["qa", "backend"], 2),
            record_at(Scope::Global, &["deployment", "frontend"], 3),
        ];
        let result = router.route(
            &records,
            &RouteFilter {
                phase: Some("testing".to_string()),
                subsystem: Some("frontend".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].key, "k1");

        let result = router.route(
            &records,
            &RouteFilter {
                tags: vec!["backend".to_string()],
                ..Default::default()
            },
        );
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_unknown_intent_is_reported_not_applied() {
        let router = MemoryRouter::default();
        let records = vec![record_at(Scope::Global, &["note"], 1)];
        let result = router.route(
            &records,
            &RouteFilter {
                intent: Some("sightseeing".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(result.records.len(), 1);
        assert!(result.filtering_reason.contains("unknown"));
    }

    #[test]
    fn test_max_results_and_scope() {
        let router = MemoryRouter::default();
        let records: Vec<_> = (0..5)
            .map(|i| record_at(Scope::Agent, &["note"], i))
            .chain((5..8).map(|i| record_at(Scope::Global, &["note"], i)))
            .collect();
        let result = router.route(
            &records,
            &RouteFilter {
                scope: vec![ScopeKind::Agent],
                max_results: Some(2),
                ..Default::default()
            },
        );
        let keys: Vec<_> = result.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["k4", "k3"]);
    }

    #[test]
    fn test_route_is_pure() {
        let router = MemoryRouter::default();
        let records: Vec<_> = (0..3).map(|i| record_at(Scope::Global, &["note"], i)).collect();
        let before = records.clone();
        let _ = router.route(&records, &RouteFilter::default());
        assert_eq!(records, before);
    }

    #[test]
    fn test_context_sufficiency() {
        let router = MemoryRouter::default();
        let ok = router.is_context_sufficient(1, RiskLevel::Low);
        assert!(ok.sufficient);
        assert!(ok.warning.is_none());

        let short = router.is_context_sufficient(9, RiskLevel::High);
        assert!(!short.sufficient);
        assert_eq!(short.required, 10);
        assert!(short.warning.unwrap().contains("high"));

        assert!(!router.is_context_sufficient(19, RiskLevel::Critical).sufficient);
        assert!(router.is_context_sufficient(5, RiskLevel::Medium).sufficient);
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!("HIGH".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("extreme".parse::<RiskLevel>().is_err());
        assert!(RiskLevel::Critical > RiskLevel::High);
    }
}
