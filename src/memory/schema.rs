//! Typed record payloads
//!
//! A record's `value` is interpreted through one of a closed set of payload
//! variants, selected from the record's tags. The store validates typed
//! payloads at the write boundary; the drift monitor re-validates stored
//! records to catch documents that bypassed it.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Payload kind selected from record tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Issue,
    Lesson,
    ReasoningPattern,
    ArchitectureDecision,
    BuilderFeedback,
    PatternUsage,
    GovernanceRule,
    Note,
}

impl PayloadKind {
    /// Pick the payload kind for a tag set. Earlier entries win.
    pub fn from_tags(tags: &BTreeSet<String>) -> Self {
        const TABLE: &[(&str, PayloadKind)] = &[
            ("governance_rule", PayloadKind::GovernanceRule),
            ("pattern_usage", PayloadKind::PatternUsage),
            ("builder_feedback", PayloadKind::BuilderFeedback),
            ("reasoning_pattern", PayloadKind::ReasoningPattern),
            ("pattern", PayloadKind::ReasoningPattern),
            ("architecture_decision", PayloadKind::ArchitectureDecision),
            ("decision", PayloadKind::ArchitectureDecision),
            ("issue", PayloadKind::Issue),
            ("lesson", PayloadKind::Lesson),
        ];
        TABLE
            .iter()
            .find(|(tag, _)| tags.contains(*tag))
            .map(|(_, kind)| *kind)
            .unwrap_or(PayloadKind::Note)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Issue => "issue",
            PayloadKind::Lesson => "lesson",
            PayloadKind::ReasoningPattern => "reasoning_pattern",
            PayloadKind::ArchitectureDecision => "architecture_decision",
            PayloadKind::BuilderFeedback => "builder_feedback",
            PayloadKind::PatternUsage => "pattern_usage",
            PayloadKind::GovernanceRule => "governance_rule",
            PayloadKind::Note => "note",
        }
    }
}

/// Issue report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePayload {
    pub description: String,
    #[serde(default)]
    pub title: Option<String>,
    /// open / resolved / closed
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
}

impl IssuePayload {
    /// Open unless explicitly resolved or closed.
    pub fn is_open(&self) -> bool {
        !matches!(
            self.status.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("resolved") | Some("closed")
        )
    }
}

/// Lesson learned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPayload {
    pub description: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Stored reasoning pattern. Every field is optional at the schema level;
/// missing required fields are reported by the pattern drift check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub approach: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub usage_count: Option<u64>,
    #[serde(default)]
    pub performance_score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub immutable: Option<bool>,
    #[serde(default)]
    pub core: Option<bool>,
}

impl PatternPayload {
    /// Names of required fields that are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields = [
            ("name", &self.name),
            ("description", &self.description),
            ("context", &self.context),
            ("approach", &self.approach),
        ];
        fields
            .iter()
            .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Architecture decision record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Directive statements such as "require module X"
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl DecisionPayload {
    /// All directive statements carried by the decision.
    pub fn statements(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.patterns.iter().map(String::as_str).collect();
        out.extend(self.decision.as_deref());
        out.extend(self.description.as_deref());
        out
    }
}

/// Difficulty rating reported by a builder agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Low,
    Medium,
    High,
}

/// External builder feedback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackPayload {
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub missing_context: bool,
    #[serde(default)]
    pub governance_conflict: bool,
    #[serde(default)]
    pub notes: Option<String>,
    /// When the feedback was given; defaults to the record timestamp
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
}

/// Back-reference container on usage records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub pattern_id: Option<String>,
}

/// One observed application of a reasoning pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePayload {
    #[serde(default)]
    pub pattern_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub success: bool,
    /// A QA failure slipped past the pattern
    #[serde(default)]
    pub qa_failure_escaped: bool,
    #[serde(default)]
    pub architecture_conflict: bool,
    /// The builder executed the plan as reasoned
    #[serde(default = "default_true")]
    pub builder_consistent: bool,
    /// No drift was reported after the pattern was applied
    #[serde(default = "default_true")]
    pub drift_stable: bool,
}

fn default_true() -> bool {
    true
}

impl UsagePayload {
    /// Referenced pattern id (`patternId`, then `metadata.patternId`).
    pub fn referenced_pattern(&self) -> Option<&str> {
        self.pattern_id
            .as_deref()
            .or_else(|| self.metadata.as_ref()?.pattern_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Governance rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceRulePayload {
    pub rule: String,
    /// `mandatory` or `advisory`
    #[serde(default)]
    pub enforcement: Option<String>,
    /// Tags the rule forbids in a request
    #[serde(default)]
    pub forbids: Vec<String>,
}

impl GovernanceRulePayload {
    pub fn is_mandatory(&self) -> bool {
        self.enforcement
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("mandatory"))
    }
}

/// Interpreted record payload
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Issue(IssuePayload),
    Lesson(LessonPayload),
    ReasoningPattern(PatternPayload),
    ArchitectureDecision(DecisionPayload),
    BuilderFeedback(FeedbackPayload),
    PatternUsage(UsagePayload),
    GovernanceRule(GovernanceRulePayload),
    Note(Value),
}

impl Payload {
    /// Interpret `value` according to the kind selected by `tags`.
    pub fn parse(tags: &BTreeSet<String>, value: &Value) -> Result<Self> {
        let kind = PayloadKind::from_tags(tags);
        Ok(match kind {
            PayloadKind::Issue => Payload::Issue(decode(kind, value)?),
            PayloadKind::Lesson => Payload::Lesson(decode(kind, value)?),
            PayloadKind::ReasoningPattern => Payload::ReasoningPattern(decode(kind, value)?),
            PayloadKind::ArchitectureDecision => {
                Payload::ArchitectureDecision(decode(kind, value)?)
            }
            PayloadKind::BuilderFeedback => Payload::BuilderFeedback(decode(kind, value)?),
            PayloadKind::PatternUsage => {
                let usage: UsagePayload = decode(kind, value)?;
                if usage.referenced_pattern().is_none() {
                    return Err(Error::Schema(
                        "pattern_usage payload must reference a patternId".to_string(),
                    ));
                }
                Payload::PatternUsage(usage)
            }
            PayloadKind::GovernanceRule => Payload::GovernanceRule(decode(kind, value)?),
            PayloadKind::Note => Payload::Note(value.clone()),
        })
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Issue(_) => PayloadKind::Issue,
            Payload::Lesson(_) => PayloadKind::Lesson,
            Payload::ReasoningPattern(_) => PayloadKind::ReasoningPattern,
            Payload::ArchitectureDecision(_) => PayloadKind::ArchitectureDecision,
            Payload::BuilderFeedback(_) => PayloadKind::BuilderFeedback,
            Payload::PatternUsage(_) => PayloadKind::PatternUsage,
            Payload::GovernanceRule(_) => PayloadKind::GovernanceRule,
            Payload::Note(_) => PayloadKind::Note,
        }
    }
}

fn decode<T: DeserializeOwned>(kind: PayloadKind, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::Schema(format!("invalid {} payload: {}", kind.as_str(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kind_priority() {
        assert_eq!(PayloadKind::from_tags(&tags(&["issue", "bug"])), PayloadKind::Issue);
        assert_eq!(
            PayloadKind::from_tags(&tags(&["issue", "pattern_usage"])),
            PayloadKind::PatternUsage
        );
        assert_eq!(PayloadKind::from_tags(&tags(&["qa_failure"])), PayloadKind::Note);
    }

    #[test]
    fn test_issue_requires_description() {
        let ok = Payload::parse(&tags(&["issue"]), &json!({"description": "Crash on save"}));
        assert!(matches!(ok, Ok(Payload::Issue(_))));

        let err = Payload::parse(&tags(&["issue"]), &json!({"title": "no description"}));
        assert!(matches!(err, Err(Error::Schema(_))));
    }

    #[test]
    fn test_pattern_type_error_is_schema_error() {
        let err = Payload::parse(&tags(&["reasoning_pattern"]), &json!({"name": 42}));
        assert!(err.is_err());

        let partial = Payload::parse(&tags(&["reasoning_pattern"]), &json!({"name": "x"})).unwrap();
        match partial {
            Payload::ReasoningPattern(p) => {
                assert_eq!(p.missing_fields(), vec!["description", "context", "approach"])
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_usage_reference_lookup() {
        let direct = Payload::parse(
            &tags(&["pattern_usage"]),
            &json!({"patternId": "p1", "success": true}),
        )
        .unwrap();
        let nested = Payload::parse(
            &tags(&["pattern_usage"]),
            &json!({"metadata": {"patternId": "p2"}}),
        )
        .unwrap();
        match (direct, nested) {
            (Payload::PatternUsage(a), Payload::PatternUsage(b)) => {
                assert_eq!(a.referenced_pattern(), Some("p1"));
                assert_eq!(b.referenced_pattern(), Some("p2"));
                assert!(b.builder_consistent);
            }
            _ => panic!("expected usage payloads"),
        }

        let missing = Payload::parse(&tags(&["pattern_usage"]), &json!({"success": true}));
        assert!(missing.is_err());
    }

    #[test]
    fn test_issue_open_status() {
        let mut issue = IssuePayload {
            description: "x".to_string(),
            title: None,
            status: None,
            severity: None,
            component: None,
        };
        assert!(issue.is_open());
        issue.status = Some("Resolved".to_string());
        assert!(!issue.is_open());
    }

    #[test]
    fn test_governance_rule_enforcement() {
        let rule = GovernanceRulePayload {
            rule: "QA must pass".to_string(),
            enforcement: Some("MANDATORY".to_string()),
            forbids: vec!["skip_qa".to_string()],
        };
        assert!(rule.is_mandatory());
    }
}
