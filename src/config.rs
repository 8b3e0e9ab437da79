//! memgov configuration management
//!
//! Every threshold the pipeline uses lives here so that heuristics can be
//! tuned per deployment without touching checker control flow. All sections
//! default to the documented values, so a TOML file only needs to name the
//! settings it overrides.

use crate::error::{Error, Result};
use crate::memory::{RiskLevel, ScopeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main memgov configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Storage configuration
    pub storage: StorageConfig,

    /// Memory router rule tables
    pub router: RouterConfig,

    /// Drift monitor configuration
    pub drift: DriftConfig,

    /// Consolidation engine configuration
    pub consolidation: ConsolidationConfig,

    /// Evolution engine configuration
    pub evolution: EvolutionConfig,

    /// Reasoning orchestrator configuration
    pub reasoning: ReasoningConfig,

    /// Background maintenance loop
    pub maintenance: MaintenanceConfig,
}

impl GovernanceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GovernanceConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.drift.error_threshold == 0 {
            return Err(Error::Config(
                "drift.error_threshold must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.consolidation.min_confidence) {
            return Err(Error::Config(
                "consolidation.min_confidence must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.consolidation.min_occurrences == 0 {
            return Err(Error::Config(
                "consolidation.min_occurrences must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.evolution.min_confidence) {
            return Err(Error::Config(
                "evolution.min_confidence must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.evolution.max_events == 0 {
            return Err(Error::Config(
                "evolution.max_events must be at least 1".to_string(),
            ));
        }
        if self.drift.max_scan_depth == 0 {
            return Err(Error::Config(
                "drift.max_scan_depth must be at least 1".to_string(),
            ));
        }
        for rule in &self.drift.secret_rules {
            regex::Regex::new(&rule.pattern).map_err(|e| {
                Error::Config(format!(
                    "Invalid regex pattern for secret rule '{}': {}",
                    rule.name, e
                ))
            })?;
        }
        Ok(())
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Which document store backs the memory fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// JSON documents on the local filesystem
    #[default]
    File,
    /// Volatile in-process map (tests, dry runs)
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend type
    pub backend: BackendKind,

    /// Base directory for the file backend
    pub base_dir: PathBuf,

    /// Reject typed payloads that fail validation at write time
    pub strict_schema: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            base_dir: default_base_dir(),
            strict_schema: true,
        }
    }
}

/// Default storage directory (~/.memgov/)
pub fn default_base_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memgov")
}

// =============================================================================
// Router
// =============================================================================

/// Intent lookup entry: which scopes to consult and which tags are relevant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRule {
    /// Scopes the intent may read
    pub scopes: Vec<ScopeKind>,
    /// Records must carry at least one of these tags
    pub tags: Vec<String>,
}

/// Per-risk-tier numeric table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskTable {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl RiskTable {
    /// Look up the value for a risk tier.
    pub fn get(&self, level: RiskLevel) -> usize {
        match level {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
            RiskLevel::Critical => self.critical,
        }
    }
}

/// Memory router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// intent -> scopes + tags
    pub intents: BTreeMap<String, IntentRule>,

    /// phase -> tags
    pub phases: BTreeMap<String, Vec<String>>,

    /// subsystem -> tags
    pub subsystems: BTreeMap<String, Vec<String>>,

    /// Tags that float a record to the front under the risk policy
    pub priority_tags: Vec<String>,

    /// Result caps per risk tier
    pub risk_caps: RiskTable,

    /// Minimum record counts for a sufficient context per risk tier
    pub min_context: RiskTable,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            intents: default_intent_rules(),
            phases: default_phase_tags(),
            subsystems: default_subsystem_tags(),
            priority_tags: strings(&["governance", "critical", "blocker", "security", "mandatory"]),
            risk_caps: RiskTable {
                low: 10,
                medium: 25,
                high: 50,
                critical: 100,
            },
            min_context: RiskTable {
                low: 1,
                medium: 5,
                high: 10,
                critical: 20,
            },
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Built-in intent table
pub fn default_intent_rules() -> BTreeMap<String, IntentRule> {
    use ScopeKind::*;
    let mut rules = BTreeMap::new();
    let mut add = |name: &str, scopes: &[ScopeKind], tags: &[&str]| {
        rules.insert(
            name.to_string(),
            IntentRule {
                scopes: scopes.to_vec(),
                tags: strings(tags),
            },
        );
    };
    add(
        "bug_fix",
        &[Project, Global],
        &["issue", "bug", "error", "qa_failure", "lesson", "knowledge_block"],
    );
    add(
        "feature",
        &[Project, Global, Agent],
        &["architecture", "architecture_decision", "pattern", "reasoning_pattern", "lesson", "governance", "knowledge_block"],
    );
    add(
        "refactor",
        &[Project, Global],
        &["architecture", "architecture_decision", "pattern", "refactor", "lesson", "knowledge_block"],
    );
    add(
        "deployment",
        &[Global, Project],
        &["deployment", "release", "ci", "governance", "knowledge_block"],
    );
    add(
        "qa",
        &[Project, Global],
        &["qa", "qa_failure", "test", "governance", "knowledge_block"],
    );
    add(
        "planning",
        &[Global, Agent, Project],
        &["architecture", "architecture_decision", "milestone", "decision", "governance", "knowledge_block"],
    );
    add(
        "governance",
        &[Global],
        &["governance", "policy", "enforcement"],
    );
    rules
}

/// Built-in phase table
pub fn default_phase_tags() -> BTreeMap<String, Vec<String>> {
    let mut phases = BTreeMap::new();
    phases.insert(
        "planning".to_string(),
        strings(&["architecture", "architecture_decision", "decision", "milestone", "plan", "governance", "knowledge_block"]),
    );
    phases.insert(
        "implementation".to_string(),
        strings(&["pattern", "reasoning_pattern", "lesson", "code", "architecture", "bug", "issue", "knowledge_block"]),
    );
    phases.insert(
        "testing".to_string(),
        strings(&["qa", "qa_failure", "test", "issue", "knowledge_block"]),
    );
    phases.insert(
        "review".to_string(),
        strings(&["governance", "qa", "lesson", "architecture_decision", "knowledge_block"]),
    );
    phases.insert(
        "deployment".to_string(),
        strings(&["deployment", "release", "ci", "governance", "knowledge_block"]),
    );
    phases
}

/// Built-in subsystem table
pub fn default_subsystem_tags() -> BTreeMap<String, Vec<String>> {
    let mut subsystems = BTreeMap::new();
    subsystems.insert("frontend".to_string(), strings(&["frontend", "ui", "web"]));
    subsystems.insert("backend".to_string(), strings(&["backend", "api", "database"]));
    subsystems.insert(
        "infrastructure".to_string(),
        strings(&["infrastructure", "ci", "deployment", "docker"]),
    );
    subsystems.insert("governance".to_string(), strings(&["governance", "policy"]));
    subsystems.insert(
        "memory".to_string(),
        strings(&["memory", "drift", "consolidation", "knowledge_block"]),
    );
    subsystems
}

// =============================================================================
// Drift
// =============================================================================

/// Drift monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Any critical issue blocks execution
    pub block_on_critical: bool,

    /// Number of `error` issues that blocks execution
    pub error_threshold: usize,

    /// Staleness thresholds
    pub staleness: StalenessConfig,

    /// Partitions that must exist in the store
    pub required_partitions: Vec<ScopeKind>,

    /// Value-pattern rules for secret detection
    pub secret_rules: Vec<SecretRule>,

    /// Field-name fragments that indicate a secret (compared case and
    /// separator insensitively)
    pub secret_field_names: Vec<String>,

    /// Maximum nesting depth the secret scan descends into
    pub max_scan_depth: usize,

    /// Contradiction heuristic vocabulary
    pub contradiction: ContradictionConfig,

    /// Builder feedback thresholds
    pub experience: ExperienceConfig,

    /// Tags that mark a project milestone
    pub milestone_tags: Vec<String>,

    /// Tags that mark a phase transition
    pub phase_transition_tags: Vec<String>,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            block_on_critical: true,
            error_threshold: 3,
            staleness: StalenessConfig::default(),
            required_partitions: vec![ScopeKind::Global, ScopeKind::Agent],
            secret_rules: default_secret_rules(),
            secret_field_names: strings(&[
                "apikey",
                "secret",
                "password",
                "passwd",
                "accesstoken",
                "authtoken",
                "refreshtoken",
                "privatekey",
                "clientsecret",
                "credential",
            ]),
            max_scan_depth: 5,
            contradiction: ContradictionConfig::default(),
            experience: ExperienceConfig::default(),
            milestone_tags: strings(&["milestone"]),
            phase_transition_tags: strings(&["phase_transition", "phase_change"]),
        }
    }
}

/// Per-category staleness thresholds in days
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessConfig {
    pub reasoning_pattern_days: i64,
    pub architecture_lesson_days: i64,
    pub issue_days: i64,
    pub project_memory_days: i64,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            reasoning_pattern_days: 180,
            architecture_lesson_days: 365,
            issue_days: 90,
            project_memory_days: 30,
        }
    }
}

/// A named value-pattern rule for secret detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretRule {
    /// Rule name, reported in findings
    pub name: String,
    /// Regex applied to string values
    pub pattern: String,
    /// Human-readable description
    pub description: String,
}

/// Built-in secret value patterns
pub fn default_secret_rules() -> Vec<SecretRule> {
    let rule = |name: &str, pattern: &str, description: &str| SecretRule {
        name: name.to_string(),
        pattern: pattern.to_string(),
        description: description.to_string(),
    };
    vec![
        rule(
            "api_key",
            r"\bsk-[A-Za-z0-9_\-]{20,}",
            "Provider API key (sk- prefix)",
        ),
        rule(
            "github_token",
            r"\bgh[pousr]_[A-Za-z0-9]{36,}",
            "GitHub access token",
        ),
        rule("aws_access_key", r"\bAKIA[0-9A-Z]{16}\b", "AWS access key id"),
        rule(
            "slack_token",
            r"\bxox[abprs]-[A-Za-z0-9\-]{10,}",
            "Slack token",
        ),
        rule(
            "private_key",
            r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |PGP )?PRIVATE KEY",
            "PEM private key block",
        ),
        rule(
            "bearer_token",
            r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]{20,}=*",
            "Bearer authorization token",
        ),
        rule(
            "credential_assignment",
            r#"(?i)\b(?:api[_-]?key|secret|token|password)\s*[:=]\s*['"]?[A-Za-z0-9/+_\-]{16,}"#,
            "Inline credential assignment",
        ),
    ]
}

/// Vocabulary of the opposite-action contradiction heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContradictionConfig {
    /// Tags that mark architecture-decision records
    pub decision_tags: Vec<String>,
    /// Verbs asserting a component must be present
    pub require_verbs: Vec<String>,
    /// Verbs asserting a component must be absent
    pub remove_verbs: Vec<String>,
}

impl Default for ContradictionConfig {
    fn default() -> Self {
        Self {
            decision_tags: strings(&["architecture_decision", "decision", "adr"]),
            require_verbs: strings(&["require", "requires", "use", "add", "adopt", "keep", "enable"]),
            remove_verbs: strings(&["remove", "removes", "drop", "forbid", "ban", "deprecate", "disable", "avoid"]),
        }
    }
}

/// Builder feedback (agent experience) thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    /// Rolling window in days
    pub window_days: i64,
    /// Fraction of high-difficulty ratings above which a warning is raised
    pub high_difficulty_ratio: f64,
    /// Missing-context reports that raise a warning
    pub missing_context_threshold: usize,
    /// Governance-conflict reports that raise an error
    pub governance_conflict_threshold: usize,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            high_difficulty_ratio: 0.5,
            missing_context_threshold: 3,
            governance_conflict_threshold: 2,
        }
    }
}

// =============================================================================
// Consolidation / Evolution / Reasoning
// =============================================================================

/// Consolidation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Minimum pattern confidence for a knowledge block
    pub min_confidence: f64,
    /// Minimum occurrences for a pattern
    pub min_occurrences: usize,
    /// Records older than this may be archived
    pub max_age_for_archival_days: i64,
    /// Retention window of archive references
    pub archive_retention_days: i64,
    /// Record count that triggers a cycle
    pub trigger_entry_count: usize,
    /// Summary truncation length
    pub summary_max_chars: usize,
    /// Projects a block applies to when no origin record names one
    pub default_applies_to: Vec<String>,
    /// Tags never treated as a recurring pattern
    pub ignored_tags: Vec<String>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            min_occurrences: 3,
            max_age_for_archival_days: 180,
            archive_retention_days: 365,
            trigger_entry_count: 30,
            summary_max_chars: 480,
            default_applies_to: strings(&["global"]),
            ignored_tags: strings(&["_retired", "knowledge_block", "pattern_usage"]),
        }
    }
}

/// Evolution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Usage records required before a pattern is scored
    pub min_usage_count: usize,
    /// Proposals below this confidence are discarded
    pub min_confidence: f64,
    /// Minimum score change that produces a proposal
    pub min_score_delta: f64,
    /// Capacity of the governance event log
    pub max_events: usize,
    /// Usage count at which relevance saturates
    pub relevance_ceiling: usize,
    /// Conflict count at which the conflict penalty saturates
    pub conflict_ceiling: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            min_usage_count: 5,
            min_confidence: 0.6,
            min_score_delta: 0.10,
            max_events: 1000,
            relevance_ceiling: 100,
            conflict_ceiling: 10,
        }
    }
}

/// Reasoning orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Knowledge blocks at or above this confidence join the snapshot
    pub knowledge_min_confidence: f64,
    /// Window for counting recent failures
    pub failure_window_hours: i64,
    /// Phrases that make an intent a governance violation
    pub forbidden_intents: Vec<String>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            knowledge_min_confidence: 0.8,
            failure_window_hours: 24,
            forbidden_intents: strings(&[
                "skip qa",
                "skip tests",
                "bypass governance",
                "ignore governance",
                "disable drift",
                "skip memory",
                "force merge",
            ]),
        }
    }
}

/// Background maintenance loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Whether the loop runs at all
    pub enabled: bool,
    /// Interval between cycles in seconds
    pub interval_secs: u64,
    /// Run consolidation when the threshold trigger fires
    pub run_consolidation: bool,
    /// Run an evolution cycle every tick
    pub run_evolution: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 3600,
            run_consolidation: true,
            run_evolution: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GovernanceConfig::default();
        assert!(config.drift.block_on_critical);
        assert_eq!(config.drift.error_threshold, 3);
        assert_eq!(config.drift.staleness.reasoning_pattern_days, 180);
        assert_eq!(config.consolidation.trigger_entry_count, 30);
        assert_eq!(config.evolution.max_events, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_risk_table_lookup() {
        let router = RouterConfig::default();
        assert_eq!(router.risk_caps.get(RiskLevel::Low), 10);
        assert_eq!(router.risk_caps.get(RiskLevel::Critical), 100);
        assert_eq!(router.min_context.get(RiskLevel::High), 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            [drift]
            error_threshold = 5

            [drift.staleness]
            issue_days = 10

            [evolution]
            min_usage_count = 2
        "#;
        let config = GovernanceConfig::from_toml(toml).unwrap();
        assert_eq!(config.drift.error_threshold, 5);
        assert_eq!(config.drift.staleness.issue_days, 10);
        assert_eq!(config.drift.staleness.reasoning_pattern_days, 180);
        assert_eq!(config.evolution.min_usage_count, 2);
        assert!((config.evolution.min_confidence - 0.6).abs() < f64::EPSILON);
        assert!(config.router.intents.contains_key("bug_fix"));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let toml = "[drift]\nerror_threshold = 0\n";
        assert!(GovernanceConfig::from_toml(toml).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_secret_regex() {
        let mut config = GovernanceConfig::default();
        config.drift.secret_rules.push(SecretRule {
            name: "broken".to_string(),
            pattern: "([".to_string(),
            description: String::new(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = GovernanceConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed = GovernanceConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed.router.intents, config.router.intents);
        assert_eq!(parsed.drift.secret_rules, config.drift.secret_rules);
    }

    #[test]
    fn test_default_secret_rules_compile() {
        for rule in default_secret_rules() {
            assert!(regex::Regex::new(&rule.pattern).is_ok(), "{}", rule.name);
        }
    }
}
