//! Drift issue and report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The nine drift categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    Schema,
    Version,
    Contradiction,
    Staleness,
    CrossAgent,
    Project,
    Pattern,
    Governance,
    AgentExperience,
}

impl DriftType {
    /// All checks in execution order
    pub const ALL: [DriftType; 9] = [
        DriftType::Schema,
        DriftType::Version,
        DriftType::Contradiction,
        DriftType::Staleness,
        DriftType::CrossAgent,
        DriftType::Project,
        DriftType::Pattern,
        DriftType::Governance,
        DriftType::AgentExperience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DriftType::Schema => "schema",
            DriftType::Version => "version",
            DriftType::Contradiction => "contradiction",
            DriftType::Staleness => "staleness",
            DriftType::CrossAgent => "cross_agent",
            DriftType::Project => "project",
            DriftType::Pattern => "pattern",
            DriftType::Governance => "governance",
            DriftType::AgentExperience => "agent_experience",
        }
    }

    /// General advice attached to reports containing this category
    pub fn general_advice(&self) -> &'static str {
        match self {
            DriftType::Schema => "Re-validate typed records against their payload schemas",
            DriftType::Version => "Rewrite affected records through the memory store to restore versioning",
            DriftType::Contradiction => "Reconcile conflicting architecture decisions and retire the superseded one",
            DriftType::Staleness => "Review stale records and retire or refresh them",
            DriftType::CrossAgent => "Initialize the missing memory partitions",
            DriftType::Project => "Record project milestones and phase transitions",
            DriftType::Pattern => "Complete or retire incomplete reasoning patterns",
            DriftType::Governance => "Resolve governance violations before executing any action",
            DriftType::AgentExperience => "Review builder feedback and improve context delivery",
        }
    }
}

impl fmt::Display for DriftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl DriftSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftSeverity::Info => "info",
            DriftSeverity::Warning => "warning",
            DriftSeverity::Error => "error",
            DriftSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall health of the memory fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Healthy,
    Warning,
    Error,
    Critical,
}

impl DriftStatus {
    /// Status for the worst severity present
    pub fn from_worst(worst: Option<DriftSeverity>) -> Self {
        match worst {
            Some(DriftSeverity::Critical) => DriftStatus::Critical,
            Some(DriftSeverity::Error) => DriftStatus::Error,
            Some(DriftSeverity::Warning) => DriftStatus::Warning,
            Some(DriftSeverity::Info) | None => DriftStatus::Healthy,
        }
    }
}

/// A single detected inconsistency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftIssue {
    #[serde(rename = "type")]
    pub drift_type: DriftType,
    pub severity: DriftSeverity,
    pub description: String,
    /// Where the issue was found (scope/key, partition, project)
    pub location: String,
    pub recommendation: String,
    pub affected_record_ids: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl DriftIssue {
    pub fn new(
        drift_type: DriftType,
        severity: DriftSeverity,
        description: impl Into<String>,
        location: impl Into<String>,
        recommendation: impl Into<String>,
        affected_record_ids: Vec<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            drift_type,
            severity,
            description: description.into(),
            location: location.into(),
            recommendation: recommendation.into(),
            affected_record_ids,
            detected_at,
        }
    }
}

/// Aggregated result of a drift scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub critical: usize,
    pub error: usize,
    pub warning: usize,
    pub info: usize,
    pub total_issues: usize,
    pub overall_status: DriftStatus,
    pub execution_blocked: bool,
    /// Checks executed, in order
    pub checks_run: Vec<DriftType>,
    pub issues: Vec<DriftIssue>,
    /// De-duplicated, in first-seen order
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl DriftReport {
    /// Issues of one category
    pub fn issues_of(&self, drift_type: DriftType) -> impl Iterator<Item = &DriftIssue> {
        self.issues.iter().filter(move |i| i.drift_type == drift_type)
    }

    /// One-line description of why execution is blocked
    pub fn block_reason(&self) -> String {
        format!(
            "{} critical and {} error drift issue(s) in the memory fabric (status: {:?})",
            self.critical, self.error, self.overall_status
        )
    }

    /// The most actionable recommendation, favouring critical issues
    pub fn primary_recommendation(&self) -> String {
        let worst = self.issues.iter().map(|i| i.severity).max();
        worst
            .and_then(|s| self.issues.iter().find(|i| i.severity == s))
            .map(|i| i.recommendation.clone())
            .unwrap_or_else(|| "Run a drift scan and resolve the reported issues".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(DriftSeverity::Critical > DriftSeverity::Error);
        assert!(DriftSeverity::Error > DriftSeverity::Warning);
        assert!(DriftSeverity::Warning > DriftSeverity::Info);
    }

    #[test]
    fn test_status_from_worst() {
        assert_eq!(DriftStatus::from_worst(None), DriftStatus::Healthy);
        assert_eq!(DriftStatus::from_worst(Some(DriftSeverity::Info)), DriftStatus::Healthy);
        assert_eq!(
            DriftStatus::from_worst(Some(DriftSeverity::Critical)),
            DriftStatus::Critical
        );
    }

    #[test]
    fn test_issue_serializes_type_field() {
        let issue = DriftIssue::new(
            DriftType::CrossAgent,
            DriftSeverity::Error,
            "missing",
            "agent",
            "init",
            vec![],
            Utc::now(),
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "cross_agent");
        assert_eq!(json["severity"], "error");
        assert!(json.get("affectedRecordIds").is_some());
    }
}
