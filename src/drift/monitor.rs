//! Drift monitor: runs the checks and aggregates a report

use super::checks::{run_check, CheckContext};
use super::contradiction::{ContradictionDetector, RegexContradictionDetector};
use super::secrets::{RegexSecretDetector, SecretDetector};
use super::types::{DriftIssue, DriftReport, DriftSeverity, DriftStatus, DriftType};
use crate::config::DriftConfig;
use crate::error::{Error, Result};
use crate::memory::{MemoryStore, StoreSnapshot};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Validates the memory fabric and decides whether execution may proceed
pub struct DriftMonitor {
    config: DriftConfig,
    secrets: Arc<dyn SecretDetector>,
    contradictions: Arc<dyn ContradictionDetector>,
}

impl DriftMonitor {
    /// Create a monitor with the regex heuristics from `config`
    pub fn new(config: DriftConfig) -> Result<Self> {
        let secrets = Arc::new(RegexSecretDetector::from_config(&config)?);
        let contradictions = Arc::new(RegexContradictionDetector::new(&config.contradiction)?);
        Ok(Self::with_detectors(config, secrets, contradictions))
    }

    /// Create a monitor with custom heuristics
    pub fn with_detectors(
        config: DriftConfig,
        secrets: Arc<dyn SecretDetector>,
        contradictions: Arc<dyn ContradictionDetector>,
    ) -> Self {
        Self {
            config,
            secrets,
            contradictions,
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Scan the live store.
    pub async fn run(&self, store: &MemoryStore) -> DriftReport {
        self.run_at(store, Utc::now()).await
    }

    /// Scan the live store as of `now`.
    pub async fn run_at(&self, store: &MemoryStore, now: DateTime<Utc>) -> DriftReport {
        let snapshot = store.snapshot().await;
        self.check_at(&snapshot, now)
    }

    /// Run all nine checks over a snapshot.
    pub fn check_at(&self, snapshot: &StoreSnapshot, now: DateTime<Utc>) -> DriftReport {
        self.check_only(&DriftType::ALL, snapshot, now)
    }

    /// Run a subset of checks over a snapshot.
    pub fn check_only(
        &self,
        checks: &[DriftType],
        snapshot: &StoreSnapshot,
        now: DateTime<Utc>,
    ) -> DriftReport {
        let ctx = CheckContext {
            snapshot,
            config: &self.config,
            secrets: self.secrets.as_ref(),
            contradictions: self.contradictions.as_ref(),
            now,
        };

        let mut issues = Vec::new();
        for check in checks {
            let found = run_check(*check, &ctx);
            tracing::debug!(check = %check, issues = found.len(), "Drift check complete");
            issues.extend(found);
        }

        let report = self.aggregate(checks.to_vec(), issues, now);
        if report.execution_blocked {
            tracing::warn!(
                critical = report.critical,
                errors = report.error,
                "Drift scan blocks execution"
            );
        } else {
            tracing::info!(
                status = ?report.overall_status,
                total = report.total_issues,
                records = snapshot.records.len(),
                "Drift scan complete"
            );
        }
        report
    }

    fn aggregate(
        &self,
        checks_run: Vec<DriftType>,
        issues: Vec<DriftIssue>,
        now: DateTime<Utc>,
    ) -> DriftReport {
        let count = |s: DriftSeverity| issues.iter().filter(|i| i.severity == s).count();
        let critical = count(DriftSeverity::Critical);
        let error = count(DriftSeverity::Error);
        let warning = count(DriftSeverity::Warning);
        let info = count(DriftSeverity::Info);

        let worst = issues.iter().map(|i| i.severity).max();
        let execution_blocked = (self.config.block_on_critical && critical > 0)
            || error >= self.config.error_threshold;

        let mut seen = HashSet::new();
        let mut recommendations = Vec::new();
        for rec in issues.iter().map(|i| i.recommendation.as_str()) {
            if seen.insert(rec.to_string()) {
                recommendations.push(rec.to_string());
            }
        }
        for drift_type in DriftType::ALL {
            if issues.iter().any(|i| i.drift_type == drift_type) {
                let advice = drift_type.general_advice();
                if seen.insert(advice.to_string()) {
                    recommendations.push(advice.to_string());
                }
            }
        }

        DriftReport {
            critical,
            error,
            warning,
            info,
            total_issues: issues.len(),
            overall_status: DriftStatus::from_worst(worst),
            execution_blocked,
            checks_run,
            issues,
            recommendations,
            generated_at: now,
        }
    }
}

/// Turn a blocking report into [`Error::ExecutionBlocked`].
pub fn ensure_not_blocked(report: &DriftReport) -> Result<()> {
    if report.execution_blocked {
        return Err(Error::ExecutionBlocked {
            reason: report.block_reason(),
            recommendation: report.primary_recommendation(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::contradiction::Contradiction;
    use crate::drift::secrets::SecretFinding;
    use crate::memory::{InMemoryBackend, MemoryRecord, Scope};
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use std::collections::BTreeSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn partitions() -> BTreeSet<String> {
        ["global", "agent"].iter().map(|s| s.to_string()).collect()
    }

    fn record(id: &str, tags: &[&str], value: Value) -> MemoryRecord {
        let mut r = MemoryRecord::new(Scope::Global, id, value, tags.iter().copied(), "t", now());
        r.id = id.to_string();
        r
    }

    fn monitor() -> DriftMonitor {
        DriftMonitor::new(DriftConfig::default()).unwrap()
    }

    #[test]
    fn test_healthy_report() {
        let snapshot = StoreSnapshot::new(
            vec![record("a", &["note"], json!({"description": "fine"}))],
            partitions(),
        );
        let report = monitor().check_at(&snapshot, now());
        assert_eq!(report.overall_status, DriftStatus::Healthy);
        assert_eq!(report.total_issues, 0);
        assert!(!report.execution_blocked);
        assert_eq!(report.checks_run.len(), 9);
        assert!(ensure_not_blocked(&report).is_ok());
    }

    #[test]
    fn test_counts_add_up_and_status_is_worst() {
        let mut no_version = record("v", &["note"], json!("x"));
        no_version.version = None;
        let snapshot = StoreSnapshot::new(
            vec![
                no_version,
                record("s", &["config"], json!({"apiKey": "sk-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"})),
            ],
            partitions(),
        );
        let report = monitor().check_at(&snapshot, now());
        assert_eq!(
            report.total_issues,
            report.critical + report.error + report.warning + report.info
        );
        assert_eq!(report.critical, 1);
        assert_eq!(report.warning, 1);
        assert_eq!(report.overall_status, DriftStatus::Critical);
        assert!(report.execution_blocked);

        let err = ensure_not_blocked(&report).unwrap_err();
        assert!(err.to_string().starts_with("Execution blocked by drift monitor"));
        assert!(err.to_string().contains("rotate the exposed credential"));
    }

    #[test]
    fn test_error_threshold_blocks() {
        let bad_version = |id: &str| {
            let mut r = record(id, &["note"], json!("x"));
            r.version = Some(0);
            r
        };
        let two = StoreSnapshot::new(vec![bad_version("a"), bad_version("b")], partitions());
        let report = monitor().check_at(&two, now());
        assert_eq!(report.error, 2);
        assert_eq!(report.overall_status, DriftStatus::Error);
        assert!(!report.execution_blocked);

        let three = StoreSnapshot::new(
            vec![bad_version("a"), bad_version("b"), bad_version("c")],
            partitions(),
        );
        assert!(monitor().check_at(&three, now()).execution_blocked);
    }

    #[test]
    fn test_critical_does_not_block_when_disabled() {
        let config = DriftConfig {
            block_on_critical: false,
            ..Default::default()
        };
        let monitor = DriftMonitor::new(config).unwrap();
        let snapshot = StoreSnapshot::new(
            vec![record("s", &["note"], json!({"skipMemoryBeforeAction": true}))],
            partitions(),
        );
        let report = monitor.check_at(&snapshot, now());
        assert_eq!(report.critical, 1);
        assert!(!report.execution_blocked);
    }

    #[test]
    fn test_recommendations_are_deduplicated() {
        let snapshot = StoreSnapshot::new(vec![], BTreeSet::new());
        let report = monitor().check_at(&snapshot, now());
        // global + agent missing, plus one general advice line
        assert_eq!(report.error, 2);
        assert_eq!(report.recommendations.len(), 3);
        let unique: HashSet<_> = report.recommendations.iter().collect();
        assert_eq!(unique.len(), report.recommendations.len());
    }

    #[test]
    fn test_report_is_deterministic() {
        let mut records: Vec<MemoryRecord> = (0..20)
            .map(|i| record(&format!("r{:02}", i), &["issue"], json!({"title": "missing"})))
            .collect();
        records.reverse();
        let snapshot = StoreSnapshot::new(records, partitions());
        let first = monitor().check_at(&snapshot, now());
        let second = monitor().check_at(&snapshot, now());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    struct NeverSecret;
    impl SecretDetector for NeverSecret {
        fn scan(&self, _value: &Value) -> Vec<SecretFinding> {
            Vec::new()
        }
    }

    struct AlwaysContradicts;
    impl ContradictionDetector for AlwaysContradicts {
        fn detect(&self, _left: &[&str], _right: &[&str]) -> Option<Contradiction> {
            Some(Contradiction {
                component: "everything".to_string(),
                strength: crate::drift::contradiction::MatchStrength::Substring,
                summary: "always".to_string(),
            })
        }
    }

    #[test]
    fn test_injected_detectors() {
        let monitor = DriftMonitor::with_detectors(
            DriftConfig::default(),
            Arc::new(NeverSecret),
            Arc::new(AlwaysContradicts),
        );
        let snapshot = StoreSnapshot::new(
            vec![
                record("a", &["decision"], json!("anything")),
                record("b", &["decision"], json!("else")),
                record("c", &["note"], json!({"apiKey": "sk-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"})),
            ],
            partitions(),
        );
        let report = monitor.check_at(&snapshot, now());
        assert_eq!(report.critical, 0);
        assert_eq!(report.issues_of(DriftType::Contradiction).count(), 1);
    }

    #[tokio::test]
    async fn test_run_against_store() {
        let store = MemoryStore::new(Arc::new(InMemoryBackend::new()), true);
        store.initialize().await.unwrap();
        store
            .write(Scope::Global, "k", json!({"description": "ok"}), vec!["note".into()], "t")
            .await
            .unwrap();
        let report = monitor().run(&store).await;
        assert_eq!(report.overall_status, DriftStatus::Healthy);
        assert!(!report.execution_blocked);
    }
}
