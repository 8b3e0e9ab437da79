//! The nine drift checks
//!
//! Every check is a pure function of a [`CheckContext`]: the store snapshot,
//! configuration, injected heuristics and an explicit `now`. Records are
//! visited in id order and projects in name order, so identical inputs give
//! identical issue lists.

use super::contradiction::{ContradictionDetector, MatchStrength};
use super::secrets::SecretDetector;
use super::types::{DriftIssue, DriftSeverity, DriftType};
use crate::config::DriftConfig;
use crate::memory::{
    DecisionPayload, FeedbackPayload, Difficulty, MemoryRecord, PatternPayload, Payload,
    PayloadKind, Scope, ScopeKind, StoreSnapshot,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Inputs shared by all checks
pub struct CheckContext<'a> {
    pub snapshot: &'a StoreSnapshot,
    pub config: &'a DriftConfig,
    pub secrets: &'a dyn SecretDetector,
    pub contradictions: &'a dyn ContradictionDetector,
    pub now: DateTime<Utc>,
}

impl<'a> CheckContext<'a> {
    fn issue(
        &self,
        drift_type: DriftType,
        severity: DriftSeverity,
        description: String,
        location: String,
        recommendation: String,
        affected: Vec<String>,
    ) -> DriftIssue {
        DriftIssue::new(
            drift_type,
            severity,
            description,
            location,
            recommendation,
            affected,
            self.now,
        )
    }

    fn active(&self) -> impl Iterator<Item = &'a MemoryRecord> {
        self.snapshot.records.iter().filter(|r| !r.is_retired())
    }
}

/// Run one check.
pub fn run_check(drift_type: DriftType, ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    match drift_type {
        DriftType::Schema => check_schema(ctx),
        DriftType::Version => check_version(ctx),
        DriftType::Contradiction => check_contradictions(ctx),
        DriftType::Staleness => check_staleness(ctx),
        DriftType::CrossAgent => check_cross_agent(ctx),
        DriftType::Project => check_projects(ctx),
        DriftType::Pattern => check_patterns(ctx),
        DriftType::Governance => check_governance(ctx),
        DriftType::AgentExperience => check_agent_experience(ctx),
    }
}

fn location(record: &MemoryRecord) -> String {
    format!("{}/{}", record.scope, record.key)
}

fn age_days(record: &MemoryRecord, now: DateTime<Utc>) -> i64 {
    (now - record.updated_at).num_days()
}

// =============================================================================
// 1. Schema
// =============================================================================

fn check_schema(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let mut issues = Vec::new();
    for record in &ctx.snapshot.records {
        let kind = PayloadKind::from_tags(&record.tags);
        let severity = match kind {
            PayloadKind::Issue | PayloadKind::Lesson => DriftSeverity::Error,
            PayloadKind::ReasoningPattern => DriftSeverity::Warning,
            _ => continue,
        };
        if let Err(e) = Payload::parse(&record.tags, &record.value) {
            issues.push(ctx.issue(
                DriftType::Schema,
                severity,
                format!("Record {} does not match the {} schema: {}", record.id, kind.as_str(), e),
                location(record),
                format!(
                    "Rewrite record {} with a valid {} payload or correct its tags",
                    record.id,
                    kind.as_str()
                ),
                vec![record.id.clone()],
            ));
        }
    }
    issues
}

// =============================================================================
// 2. Version
// =============================================================================

fn check_version(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let mut issues = Vec::new();
    for record in &ctx.snapshot.records {
        let (severity, description) = match record.version {
            None => (
                DriftSeverity::Warning,
                format!("Record {} has a missing or non-numeric version", record.id),
            ),
            Some(v) if v < 1 => (
                DriftSeverity::Error,
                format!("Record {} has invalid version {} (must be >= 1)", record.id, v),
            ),
            Some(_) => continue,
        };
        issues.push(ctx.issue(
            DriftType::Version,
            severity,
            description,
            location(record),
            format!(
                "Rewrite record {} through the memory store so it carries a valid version",
                record.id
            ),
            vec![record.id.clone()],
        ));
    }
    issues
}

// =============================================================================
// 3. Contradiction
// =============================================================================

fn decision_statements(record: &MemoryRecord) -> (DecisionPayload, Option<&str>) {
    let payload = serde_json::from_value::<DecisionPayload>(record.value.clone()).unwrap_or_default();
    (payload, record.value.as_str())
}

fn check_contradictions(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let tags = &ctx.config.contradiction.decision_tags;
    let decisions: Vec<(&MemoryRecord, DecisionPayload, Option<&str>)> = ctx
        .active()
        .filter(|r| r.has_any_tag(tags))
        .map(|r| {
            let (payload, bare) = decision_statements(r);
            (r, payload, bare)
        })
        .collect();

    let mut issues = Vec::new();
    for (i, (left, left_payload, left_bare)) in decisions.iter().enumerate() {
        let mut left_statements = left_payload.statements();
        left_statements.extend(*left_bare);

        for (right, right_payload, right_bare) in decisions.iter().skip(i + 1) {
            let mut right_statements = right_payload.statements();
            right_statements.extend(*right_bare);

            let Some(found) = ctx.contradictions.detect(&left_statements, &right_statements) else {
                continue;
            };
            let severity = match found.strength {
                MatchStrength::Exact => DriftSeverity::Critical,
                MatchStrength::Substring => DriftSeverity::Warning,
            };
            issues.push(ctx.issue(
                DriftType::Contradiction,
                severity,
                format!(
                    "Architecture decisions {} and {} contradict each other on '{}' ({})",
                    left.id, right.id, found.component, found.summary
                ),
                format!("{} <-> {}", location(left), location(right)),
                format!(
                    "Decide which of the decisions on '{}' stands and retire the other",
                    found.component
                ),
                vec![left.id.clone(), right.id.clone()],
            ));
        }
    }
    issues
}

// =============================================================================
// 4. Staleness
// =============================================================================

fn check_staleness(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let thresholds = &ctx.config.staleness;
    let mut issues = Vec::new();

    for record in ctx.active() {
        let age = age_days(record, ctx.now);
        let (severity, limit, label) = match PayloadKind::from_tags(&record.tags) {
            PayloadKind::ReasoningPattern if age > thresholds.reasoning_pattern_days => (
                DriftSeverity::Warning,
                thresholds.reasoning_pattern_days,
                "Reasoning pattern",
            ),
            PayloadKind::Lesson if age > thresholds.architecture_lesson_days => (
                DriftSeverity::Info,
                thresholds.architecture_lesson_days,
                "Lesson",
            ),
            PayloadKind::Issue if age > thresholds.issue_days * 2 => {
                (DriftSeverity::Info, thresholds.issue_days * 2, "Issue")
            }
            _ => continue,
        };
        issues.push(ctx.issue(
            DriftType::Staleness,
            severity,
            format!(
                "{} {} was last updated {} days ago (threshold {} days)",
                label, record.id, age, limit
            ),
            location(record),
            format!("Review record {} and refresh or retire it", record.id),
            vec![record.id.clone()],
        ));
    }

    for (project, records) in group_by_project(ctx) {
        let Some(newest) = records.iter().map(|r| r.updated_at).max() else {
            continue;
        };
        let age = (ctx.now - newest).num_days();
        if age > thresholds.project_memory_days {
            issues.push(ctx.issue(
                DriftType::Staleness,
                DriftSeverity::Info,
                format!(
                    "Project '{}' memory has not been updated for {} days (threshold {} days)",
                    project, age, thresholds.project_memory_days
                ),
                Scope::project(project.clone()).to_string(),
                format!("Refresh or archive the memory of project '{}'", project),
                records.iter().map(|r| r.id.clone()).collect(),
            ));
        }
    }
    issues
}

fn group_by_project<'a>(ctx: &CheckContext<'a>) -> BTreeMap<String, Vec<&'a MemoryRecord>> {
    let mut groups: BTreeMap<String, Vec<&MemoryRecord>> = BTreeMap::new();
    for record in ctx.active().filter(|r| r.scope.kind() == ScopeKind::Project) {
        let project = record
            .project_id()
            .unwrap_or_else(|| "unassigned".to_string());
        groups.entry(project).or_default().push(record);
    }
    groups
}

// =============================================================================
// 5. Cross-agent
// =============================================================================

fn check_cross_agent(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let partitions = &ctx.snapshot.partitions;
    let mut issues = Vec::new();
    for kind in &ctx.config.required_partitions {
        let present = match kind {
            ScopeKind::Global | ScopeKind::Agent => partitions.contains(kind.as_str()),
            ScopeKind::Project => partitions.iter().any(|p| p.starts_with("project-")),
        };
        if !present {
            issues.push(ctx.issue(
                DriftType::CrossAgent,
                DriftSeverity::Error,
                format!("Required memory partition '{}' does not exist", kind),
                kind.as_str().to_string(),
                format!(
                    "Initialize the '{}' memory partition so agents share a common context",
                    kind
                ),
                Vec::new(),
            ));
        }
    }
    issues
}

// =============================================================================
// 6. Project
// =============================================================================

fn check_projects(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let config = ctx.config;
    let mut issues = Vec::new();
    for (project, records) in group_by_project(ctx) {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let location = Scope::project(project.clone()).to_string();

        if !records.iter().any(|r| r.has_any_tag(&config.milestone_tags)) {
            issues.push(ctx.issue(
                DriftType::Project,
                DriftSeverity::Warning,
                format!("Project '{}' has no milestone records", project),
                location.clone(),
                format!("Record the current milestone of project '{}'", project),
                ids.clone(),
            ));
        }

        let has_transition = records.iter().any(|r| {
            r.has_any_tag(&config.phase_transition_tags)
                || r.tags.iter().any(|t| t.starts_with("phase:"))
        });
        if !has_transition {
            issues.push(ctx.issue(
                DriftType::Project,
                DriftSeverity::Info,
                format!("Project '{}' has no phase transition records", project),
                location,
                format!("Tag phase transitions of project '{}'", project),
                ids,
            ));
        }
    }
    issues
}

// =============================================================================
// 7. Pattern
// =============================================================================

const REQUIRED_PATTERN_FIELDS: [&str; 4] = ["name", "description", "context", "approach"];

fn check_patterns(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let mut issues = Vec::new();
    for record in ctx.active() {
        if PayloadKind::from_tags(&record.tags) != PayloadKind::ReasoningPattern {
            continue;
        }
        let missing = serde_json::from_value::<PatternPayload>(record.value.clone())
            .map(|p| p.missing_fields())
            .unwrap_or_else(|_| REQUIRED_PATTERN_FIELDS.to_vec());
        if missing.is_empty() {
            continue;
        }
        issues.push(ctx.issue(
            DriftType::Pattern,
            DriftSeverity::Error,
            format!(
                "Reasoning pattern {} is missing required fields: {}",
                record.id,
                missing.join(", ")
            ),
            location(record),
            format!(
                "Complete fields [{}] of pattern {} or retire it",
                missing.join(", "),
                record.id
            ),
            vec![record.id.clone()],
        ));
    }
    issues
}

// =============================================================================
// 8. Governance
// =============================================================================

fn claims_mandatory(record: &MemoryRecord) -> bool {
    record.has_tag("enforcement:mandatory")
        || record
            .value_str("enforcement")
            .is_some_and(|e| e.eq_ignore_ascii_case("mandatory"))
}

fn skips_memory(record: &MemoryRecord) -> bool {
    let flag = |field: &str| record.value.get(field).and_then(Value::as_bool) == Some(true);
    flag("skipMemoryBeforeAction")
        || flag("skip_memory_before_action")
        || record.has_tag("skip_memory")
        || record.has_tag("skip_memory_before_action")
}

fn check_governance(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let mut issues = Vec::new();
    for record in &ctx.snapshot.records {
        if claims_mandatory(record) && !record.has_any_tag(&["governance", "governance_rule"]) {
            issues.push(ctx.issue(
                DriftType::Governance,
                DriftSeverity::Critical,
                format!(
                    "Record {} claims mandatory enforcement without a governance tag",
                    record.id
                ),
                location(record),
                format!(
                    "Tag record {} as governance or drop its mandatory enforcement claim",
                    record.id
                ),
                vec![record.id.clone()],
            ));
        }

        let findings = ctx.secrets.scan(&record.value);
        if !findings.is_empty() {
            let detail = findings
                .iter()
                .map(|f| format!("{} ({}: {})", f.path, f.rule, f.redacted))
                .collect::<Vec<_>>()
                .join(", ");
            issues.push(ctx.issue(
                DriftType::Governance,
                DriftSeverity::Critical,
                format!("Record {} contains secret material: {}", record.id, detail),
                location(record),
                format!(
                    "Remove the secret from record {} and rotate the exposed credential",
                    record.id
                ),
                vec![record.id.clone()],
            ));
        }

        if skips_memory(record) {
            issues.push(ctx.issue(
                DriftType::Governance,
                DriftSeverity::Critical,
                format!(
                    "Record {} instructs agents to skip memory consultation before acting",
                    record.id
                ),
                location(record),
                format!(
                    "Remove the skip-memory instruction from record {}; memory must be consulted before every action",
                    record.id
                ),
                vec![record.id.clone()],
            ));
        }
    }
    issues
}

// =============================================================================
// 9. Agent experience
// =============================================================================

fn check_agent_experience(ctx: &CheckContext<'_>) -> Vec<DriftIssue> {
    let thresholds = &ctx.config.experience;
    let since = ctx.now - Duration::days(thresholds.window_days);

    let feedback: Vec<(&MemoryRecord, FeedbackPayload)> = ctx
        .active()
        .filter(|r| PayloadKind::from_tags(&r.tags) == PayloadKind::BuilderFeedback)
        .filter_map(|r| {
            serde_json::from_value::<FeedbackPayload>(r.value.clone())
                .ok()
                .map(|f| (r, f))
        })
        .filter(|(r, f)| {
            let at = f.reported_at.unwrap_or(r.created_at);
            at >= since && at <= ctx.now
        })
        .collect();

    let mut issues = Vec::new();
    if feedback.is_empty() {
        return issues;
    }
    let location = format!("builder feedback (last {} days)", thresholds.window_days);
    let ids_where = |pred: &dyn Fn(&FeedbackPayload) -> bool| -> Vec<String> {
        feedback
            .iter()
            .filter(|(_, f)| pred(f))
            .map(|(r, _)| r.id.clone())
            .collect()
    };

    let rated = feedback.iter().filter(|(_, f)| f.difficulty.is_some()).count();
    let high = ids_where(&|f| f.difficulty == Some(Difficulty::High));
    if rated > 0 && high.len() as f64 / rated as f64 > thresholds.high_difficulty_ratio {
        issues.push(ctx.issue(
            DriftType::AgentExperience,
            DriftSeverity::Warning,
            format!(
                "{} of {} builder ratings report high difficulty",
                high.len(),
                rated
            ),
            location.clone(),
            "Break work into smaller tasks and enrich the routed context for builders"
                .to_string(),
            high,
        ));
    }

    let missing = ids_where(&|f| f.missing_context);
    if missing.len() >= thresholds.missing_context_threshold {
        issues.push(ctx.issue(
            DriftType::AgentExperience,
            DriftSeverity::Warning,
            format!("{} builder reports of missing context", missing.len()),
            location.clone(),
            "Review router intent and phase tables so builders receive the records they need"
                .to_string(),
            missing,
        ));
    }

    let conflicts = ids_where(&|f| f.governance_conflict);
    if conflicts.len() >= thresholds.governance_conflict_threshold {
        issues.push(ctx.issue(
            DriftType::AgentExperience,
            DriftSeverity::Error,
            format!("{} builder reports of governance conflicts", conflicts.len()),
            location,
            "Reconcile governance rules with the instructions builders receive".to_string(),
            conflicts,
        ));
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::contradiction::RegexContradictionDetector;
    use crate::drift::secrets::RegexSecretDetector;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(id: &str, scope: Scope, tags: &[&str], value: Value, age_days: i64) -> MemoryRecord {
        let at = now() - Duration::days(age_days);
        let mut r = MemoryRecord::new(scope, id, value, tags.iter().copied(), "test", at);
        r.id = id.to_string();
        r
    }

    fn run(drift_type: DriftType, records: Vec<MemoryRecord>) -> Vec<DriftIssue> {
        let partitions: BTreeSet<String> =
            ["global", "agent"].iter().map(|s| s.to_string()).collect();
        run_with(drift_type, records, partitions)
    }

    fn run_with(
        drift_type: DriftType,
        records: Vec<MemoryRecord>,
        partitions: BTreeSet<String>,
    ) -> Vec<DriftIssue> {
        let config = DriftConfig::default();
        let secrets = RegexSecretDetector::from_config(&config).unwrap();
        let contradictions = RegexContradictionDetector::new(&config.contradiction).unwrap();
        let snapshot = StoreSnapshot::new(records, partitions);
        let ctx = CheckContext {
            snapshot: &snapshot,
            config: &config,
            secrets: &secrets,
            contradictions: &contradictions,
            now: now(),
        };
        run_check(drift_type, &ctx)
    }

    #[test]
    fn test_schema_severity_by_kind() {
        let issues = run(
            DriftType::Schema,
            vec![
                record("a", Scope::Global, &["issue"], json!({"title": "x"}), 1),
                record("b", Scope::Global, &["reasoning_pattern"], json!({"name": 1}), 1),
                record("c", Scope::Global, &["lesson"], json!({"description": "ok"}), 1),
            ],
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, DriftSeverity::Error);
        assert_eq!(issues[1].severity, DriftSeverity::Warning);
    }

    #[test]
    fn test_version_drift() {
        let mut missing = record("a", Scope::Global, &["note"], json!("x"), 1);
        missing.version = None;
        let mut zero = record("b", Scope::Global, &["note"], json!("x"), 1);
        zero.version = Some(0);
        let ok = record("c", Scope::Global, &["note"], json!("x"), 1);

        let issues = run(DriftType::Version, vec![missing, zero, ok]);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, DriftSeverity::Warning);
        assert_eq!(issues[1].severity, DriftSeverity::Error);
    }

    #[test]
    fn test_contradiction_between_decisions() {
        let issues = run(
            DriftType::Contradiction,
            vec![
                record("d1", Scope::Global, &["architecture_decision"], json!({"patterns": ["require module X"]}), 1),
                record("d2", Scope::Global, &["architecture_decision"], json!({"patterns": ["remove module X"]}), 1),
                record("d3", Scope::Global, &["architecture_decision"], json!({"patterns": ["use module Y"]}), 1),
            ],
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, DriftSeverity::Critical);
        assert_eq!(issues[0].affected_record_ids, vec!["d1", "d2"]);
    }

    #[test]
    fn test_retired_decisions_are_ignored() {
        let mut retired = record("d2", Scope::Global, &["decision"], json!("remove module X"), 1);
        retired.tags.insert("_retired".to_string());
        let issues = run(
            DriftType::Contradiction,
            vec![
                record("d1", Scope::Global, &["decision"], json!("require module X"), 1),
                retired,
            ],
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_staleness_thresholds() {
        let issues = run(
            DriftType::Staleness,
            vec![
                record("p", Scope::Global, &["reasoning_pattern"], json!({}), 181),
                record("l", Scope::Global, &["lesson"], json!({"description": "d"}), 366),
                record("i1", Scope::Global, &["issue"], json!({"description": "d"}), 120),
                record("i2", Scope::Global, &["issue"], json!({"description": "d"}), 181),
                record("fresh", Scope::project("alpha"), &["note"], json!("x"), 2),
                record("old", Scope::project("beta"), &["note"], json!("x"), 45),
            ],
        );
        let summary: Vec<(DriftSeverity, Vec<String>)> = issues
            .iter()
            .map(|i| (i.severity, i.affected_record_ids.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DriftSeverity::Info, vec!["i2".to_string()]),
                (DriftSeverity::Info, vec!["l".to_string()]),
                (DriftSeverity::Warning, vec!["p".to_string()]),
                (DriftSeverity::Info, vec!["old".to_string()]),
            ]
        );
    }

    #[test]
    fn test_cross_agent_missing_partition() {
        let partitions: BTreeSet<String> = ["global"].iter().map(|s| s.to_string()).collect();
        let issues = run_with(DriftType::CrossAgent, vec![], partitions);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, DriftSeverity::Error);
        assert_eq!(issues[0].location, "agent");
    }

    #[test]
    fn test_project_drift() {
        let issues = run(
            DriftType::Project,
            vec![
                record("a1", Scope::project("alpha"), &["note"], json!("x"), 1),
                record("b1", Scope::project("beta"), &["milestone", "phase:testing"], json!("x"), 1),
            ],
        );
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.location == "project:alpha"));
        assert_eq!(issues[0].severity, DriftSeverity::Warning);
        assert_eq!(issues[1].severity, DriftSeverity::Info);
    }

    #[test]
    fn test_pattern_missing_fields() {
        let complete = json!({"name": "n", "description": "d", "context": "c", "approach": "a"});
        let issues = run(
            DriftType::Pattern,
            vec![
                record("p1", Scope::Global, &["reasoning_pattern"], complete, 1),
                record("p2", Scope::Global, &["reasoning_pattern"], json!({"name": "n"}), 1),
            ],
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, DriftSeverity::Error);
        assert!(issues[0].description.contains("description, context, approach"));
    }

    #[test]
    fn test_governance_secret_is_single_critical() {
        let issues = run(
            DriftType::Governance,
            vec![record(
                "s",
                Scope::Global,
                &["config"],
                json!({"apiKey": "sk-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"}),
                1,
            )],
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, DriftSeverity::Critical);
        assert_eq!(issues[0].affected_record_ids, vec!["s"]);
        assert!(!issues[0].description.contains("xxxxxxxx"));
    }

    #[test]
    fn test_governance_mandatory_and_skip_memory() {
        let issues = run(
            DriftType::Governance,
            vec![
                record("m1", Scope::Global, &["policy"], json!({"enforcement": "mandatory"}), 1),
                record("m2", Scope::Global, &["governance"], json!({"enforcement": "mandatory"}), 1),
                record("s1", Scope::Agent, &["note"], json!({"skipMemoryBeforeAction": true}), 1),
            ],
        );
        let ids: Vec<&str> = issues
            .iter()
            .map(|i| i.affected_record_ids[0].as_str())
            .collect();
        assert_eq!(ids, vec!["m1", "s1"]);
        assert!(issues.iter().all(|i| i.severity == DriftSeverity::Critical));
    }

    #[test]
    fn test_agent_experience_thresholds() {
        let fb = |id: &str, value: Value, age: i64| {
            record(id, Scope::Agent, &["builder_feedback"], value, age)
        };
        let issues = run(
            DriftType::AgentExperience,
            vec![
                fb("f1", json!({"difficulty": "high", "missingContext": true}), 1),
                fb("f2", json!({"difficulty": "high", "missingContext": true, "governanceConflict": true}), 2),
                fb("f3", json!({"difficulty": "low", "missingContext": true, "governanceConflict": true}), 3),
                fb("old", json!({"difficulty": "low", "governanceConflict": true}), 40),
            ],
        );
        let severities: Vec<DriftSeverity> = issues.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            vec![DriftSeverity::Warning, DriftSeverity::Warning, DriftSeverity::Error]
        );
        assert_eq!(issues[2].affected_record_ids, vec!["f2", "f3"]);
    }

    #[test]
    fn test_experience_half_high_is_not_a_warning() {
        let issues = run(
            DriftType::AgentExperience,
            vec![
                record("f1", Scope::Agent, &["builder_feedback"], json!({"difficulty": "high"}), 1),
                record("f2", Scope::Agent, &["builder_feedback"], json!({"difficulty": "low"}), 1),
            ],
        );
        assert!(issues.is_empty());
    }
}
