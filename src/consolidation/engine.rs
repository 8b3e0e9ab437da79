//! Rule-based consolidation of memory records into knowledge blocks
//!
//! A cycle runs five deterministic stages over the full record set:
//!
//! 1. **Pattern detection**: records grouped by tag; groups with at least
//!    `min_occurrences` members become patterns with confidence
//!    `min(occurrences / 10, 1)`.
//! 2. **Duplicate collapse**: records with the same scope and key, or with
//!    identical tags and description, collapse into the first occurrence.
//! 3. **Significance scoring**: six additive factors, 0 to 100.
//! 4. **Knowledge-block generation**: qualifying patterns become blocks
//!    unless an overlapping block already exists.
//! 5. **Archival**: old, low-significance records get an archive reference.
//!    Originals are never deleted.

use super::knowledge_store::{ArchiveIndex, KnowledgeStore};
use super::types::*;
use crate::config::ConsolidationConfig;
use crate::error::Result;
use crate::memory::{MemoryRecord, MemoryStore};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

const SEVERITY_CRITICAL_TAGS: [&str; 2] = ["critical", "blocker"];
const SEVERITY_HIGH_TAGS: [&str; 3] = ["high", "error", "security"];
const SEVERITY_MEDIUM_TAGS: [&str; 3] = ["medium", "warning", "issue"];
const GOVERNANCE_TAGS: [&str; 4] = ["governance", "policy", "enforcement", "governance_rule"];
const DRIFT_RISK_TAGS: [&str; 4] = ["architecture_decision", "decision", "drift", "governance_rule"];
const DRIFT_WATCH_TAGS: [&str; 3] = ["reasoning_pattern", "pattern", "lesson"];

/// Knowledge consolidation engine
pub struct ConsolidationEngine {
    config: ConsolidationConfig,
    knowledge: Arc<KnowledgeStore>,
    archive: Arc<ArchiveIndex>,
}

impl ConsolidationEngine {
    pub fn new(
        config: ConsolidationConfig,
        knowledge: Arc<KnowledgeStore>,
        archive: Arc<ArchiveIndex>,
    ) -> Self {
        Self {
            config,
            knowledge,
            archive,
        }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Whether a threshold-triggered cycle is due for `record_count` records.
    pub fn should_trigger(&self, record_count: usize) -> bool {
        record_count >= self.config.trigger_entry_count
    }

    fn candidates<'a>(&self, records: &'a [MemoryRecord]) -> Vec<&'a MemoryRecord> {
        let mut out: Vec<&MemoryRecord> = records.iter().filter(|r| !r.is_retired()).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    // =========================================================================
    // Stage 1: pattern detection
    // =========================================================================

    /// Group records by tag and keep recurring groups, ordered by tag.
    pub fn detect_patterns(&self, records: &[MemoryRecord]) -> Vec<DetectedPattern> {
        let mut groups: BTreeMap<&str, Vec<&MemoryRecord>> = BTreeMap::new();
        for record in self.candidates(records) {
            for tag in &record.tags {
                if self.config.ignored_tags.iter().any(|t| t == tag) {
                    continue;
                }
                groups.entry(tag.as_str()).or_default().push(record);
            }
        }

        groups
            .into_iter()
            .filter(|(_, group)| group.len() >= self.config.min_occurrences)
            .map(|(tag, group)| DetectedPattern {
                tag: tag.to_string(),
                category: PatternCategory::from_tag(tag),
                occurrences: group.len(),
                confidence: (group.len() as f64 / 10.0).min(1.0),
                record_ids: group.iter().map(|r| r.id.clone()).collect(),
            })
            .collect()
    }

    // =========================================================================
    // Stage 2: duplicate collapse
    // =========================================================================

    /// Collapse duplicate records into their first occurrence.
    pub fn find_duplicates(&self, records: &[MemoryRecord]) -> Vec<DuplicateGroup> {
        let mut kept: Vec<(&MemoryRecord, Vec<String>)> = Vec::new();
        for record in self.candidates(records) {
            let existing = kept.iter_mut().find(|(first, _)| is_duplicate(first, record));
            match existing {
                Some((_, collapsed)) => collapsed.push(record.id.clone()),
                None => kept.push((record, Vec::new())),
            }
        }

        kept.into_iter()
            .filter(|(_, collapsed)| !collapsed.is_empty())
            .map(|(first, collapsed)| DuplicateGroup {
                kept_id: first.id.clone(),
                collapsed_ids: collapsed,
            })
            .collect()
    }

    // =========================================================================
    // Stage 3: significance scoring
    // =========================================================================

    /// Score every active record, in id order.
    pub fn score_records(
        &self,
        records: &[MemoryRecord],
        patterns: &[DetectedPattern],
        duplicates: &[DuplicateGroup],
        now: DateTime<Utc>,
    ) -> Vec<SignificanceScore> {
        let by_id: HashMap<&str, &MemoryRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();
        let collapsed: BTreeSet<&str> = duplicates
            .iter()
            .flat_map(|g| g.collapsed_ids.iter().map(String::as_str))
            .collect();

        let mut description_counts: HashMap<String, usize> = HashMap::new();
        for record in records.iter().filter(|r| !r.is_retired()) {
            if let Some(d) = record.description() {
                *description_counts.entry(normalize(d)).or_default() += 1;
            }
        }

        let mut active: Vec<&MemoryRecord> = records.iter().filter(|r| !r.is_retired()).collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));

        active
            .into_iter()
            .map(|record| {
                let containing: Vec<&DetectedPattern> = patterns
                    .iter()
                    .filter(|p| p.record_ids.iter().any(|id| id == &record.id))
                    .collect();

                let frequency = containing.iter().map(|p| p.occurrences).max().unwrap_or(1);
                let projects: BTreeSet<String> = containing
                    .iter()
                    .flat_map(|p| p.record_ids.iter())
                    .filter_map(|id| by_id.get(id.as_str()))
                    .filter_map(|r| r.project_id())
                    .chain(record.project_id())
                    .collect();
                let recurrence = record
                    .description()
                    .and_then(|d| description_counts.get(&normalize(d)))
                    .copied()
                    .unwrap_or(1);

                let stale = (now - record.updated_at).num_days()
                    > self.config.max_age_for_archival_days;
                let factors = ScoreFactors {
                    frequency: (frequency as f64 * 5.0).min(25.0),
                    severity: severity_factor(record),
                    project_breadth: (projects.len() as f64 * 5.0).min(15.0),
                    governance: if record.has_any_tag(&GOVERNANCE_TAGS) { 15.0 } else { 0.0 },
                    recurrence: (recurrence.saturating_sub(1) as f64 * 5.0).min(15.0),
                    drift_risk: drift_risk_factor(record, stale),
                };

                let score = factors.total().clamp(0.0, 100.0);
                let classification = Significance::classify(score);
                let recommendation = if collapsed.contains(record.id.as_str()) {
                    Recommendation::Delete
                } else {
                    match classification {
                        Significance::High => Recommendation::Consolidate,
                        Significance::Medium => Recommendation::Keep,
                        Significance::Low => Recommendation::Archive,
                    }
                };

                SignificanceScore {
                    record_id: record.id.clone(),
                    score,
                    factors,
                    classification,
                    recommendation,
                }
            })
            .collect()
    }

    // =========================================================================
    // Stage 4: knowledge-block generation
    // =========================================================================

    /// Build knowledge blocks for qualifying patterns.
    ///
    /// Blocks overlapping `existing` (or each other) are rejected; blocks
    /// failing validation are dropped. Returns the new blocks and the number
    /// rejected as duplicates.
    pub fn generate_blocks(
        &self,
        patterns: &[DetectedPattern],
        records: &[MemoryRecord],
        existing: &[KnowledgeBlock],
        now: DateTime<Utc>,
    ) -> (Vec<KnowledgeBlock>, usize) {
        let by_id: HashMap<&str, &MemoryRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();
        let mut created: Vec<KnowledgeBlock> = Vec::new();
        let mut rejected = 0;

        for pattern in patterns {
            if pattern.confidence < self.config.min_confidence
                || pattern.occurrences < self.config.min_occurrences
            {
                continue;
            }
            let origins: Vec<&MemoryRecord> = pattern
                .record_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();

            let block = match self.build_block(pattern, &origins, now) {
                Ok(block) => block,
                Err(e) => {
                    tracing::debug!(tag = %pattern.tag, "Dropped invalid knowledge block: {}", e);
                    continue;
                }
            };

            if existing.iter().chain(created.iter()).any(|b| b.overlaps(&block)) {
                rejected += 1;
                continue;
            }
            created.push(block);
        }
        (created, rejected)
    }

    fn build_block(
        &self,
        pattern: &DetectedPattern,
        origins: &[&MemoryRecord],
        now: DateTime<Utc>,
    ) -> Result<KnowledgeBlock> {
        let first = origins
            .iter()
            .find_map(|r| r.description())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Recurring '{}' records", pattern.tag));
        let summary = format!(
            "{} (observed {} times)",
            truncate(&first, self.config.summary_max_chars),
            pattern.occurrences
        );
        let lesson = pattern
            .category
            .lesson_template()
            .replace("{tag}", &pattern.tag)
            .replace("{count}", &pattern.occurrences.to_string());

        let projects: BTreeSet<String> = origins.iter().filter_map(|r| r.project_id()).collect();
        let applies_to: Vec<String> = if projects.is_empty() {
            self.config.default_applies_to.clone()
        } else {
            projects.into_iter().collect()
        };

        let importance = if origins
            .iter()
            .any(|r| r.has_any_tag(&SEVERITY_CRITICAL_TAGS))
        {
            Importance::Critical
        } else if pattern.occurrences >= 10 || pattern.category == PatternCategory::GovernancePattern
        {
            Importance::High
        } else if pattern.occurrences >= 5 {
            Importance::Medium
        } else {
            Importance::Low
        };

        KnowledgeBlockBuilder::new(pattern.category)
            .summary(summary)
            .lesson(lesson)
            .applies_to(applies_to)
            .origin_records(origins.iter().map(|r| r.id.clone()))
            .confidence(pattern.confidence)
            .importance(importance)
            .timestamp(now)
            .build()
    }

    // =========================================================================
    // Stage 5: archival
    // =========================================================================

    /// Archive references for old records recommended for archival.
    pub fn plan_archival(
        &self,
        records: &[MemoryRecord],
        scores: &[SignificanceScore],
        now: DateTime<Utc>,
    ) -> Vec<ArchiveReference> {
        let by_id: HashMap<&str, &MemoryRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();
        scores
            .iter()
            .filter(|s| s.recommendation == Recommendation::Archive)
            .filter_map(|s| by_id.get(s.record_id.as_str()).map(|r| (s, *r)))
            .filter(|(_, r)| (now - r.updated_at).num_days() > self.config.max_age_for_archival_days)
            .map(|(s, r)| ArchiveReference {
                record_id: r.id.clone(),
                scope: r.scope.clone(),
                key: r.key.clone(),
                score: s.score,
                reason: format!(
                    "low significance ({:.0}) and not updated for {} days",
                    s.score,
                    (now - r.updated_at).num_days()
                ),
                archived_at: now,
                retain_until: now + Duration::days(self.config.archive_retention_days),
            })
            .collect()
    }

    // =========================================================================
    // Full cycle
    // =========================================================================

    /// Run a full consolidation cycle against the store.
    pub async fn run(
        &self,
        store: &MemoryStore,
        trigger: ConsolidationTrigger,
    ) -> Result<ConsolidationReport> {
        self.run_at(store, trigger, Utc::now()).await
    }

    /// Run a full consolidation cycle as of `now`.
    pub async fn run_at(
        &self,
        store: &MemoryStore,
        trigger: ConsolidationTrigger,
        now: DateTime<Utc>,
    ) -> Result<ConsolidationReport> {
        let records = store.all_records().await;
        tracing::info!(
            trigger = ?trigger,
            records = records.len(),
            "Consolidation cycle started"
        );

        let patterns = self.detect_patterns(&records);
        let duplicates = self.find_duplicates(&records);
        let scores = self.score_records(&records, &patterns, &duplicates, now);

        let existing = self.knowledge.all().await;
        let (blocks, mut rejected) = self.generate_blocks(&patterns, &records, &existing, now);

        let mut failures = Vec::new();
        let mut created = Vec::new();
        for block in blocks {
            let id = block.id.clone();
            match self.knowledge.append(block.clone()).await {
                Ok(true) => created.push(block),
                Ok(false) => rejected += 1,
                Err(e) => {
                    tracing::warn!("Failed to store knowledge block {}: {}", id, e);
                    failures.push(format!("knowledge block {}: {}", id, e));
                }
            }
        }

        let mut archived = Vec::new();
        for reference in self.plan_archival(&records, &scores, now) {
            match self.archive.contains(&reference.record_id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    failures.push(format!("archive lookup {}: {}", reference.record_id, e));
                    continue;
                }
            }
            match self.archive.insert(&reference).await {
                Ok(()) => archived.push(reference.record_id),
                Err(e) => {
                    tracing::warn!("Failed to archive record {}: {}", reference.record_id, e);
                    failures.push(format!("archive {}: {}", reference.record_id, e));
                }
            }
        }

        let count = |s: Significance| scores.iter().filter(|x| x.classification == s).count();
        let report = ConsolidationReport {
            trigger,
            records_analyzed: records.len(),
            high_significance: count(Significance::High),
            medium_significance: count(Significance::Medium),
            low_significance: count(Significance::Low),
            patterns,
            duplicate_groups: duplicates,
            blocks_created: created,
            blocks_rejected: rejected,
            records_archived: archived,
            failures,
            completed_at: now,
        };
        tracing::info!(
            patterns = report.patterns.len(),
            blocks = report.blocks_created.len(),
            archived = report.records_archived.len(),
            failures = report.failures.len(),
            "Consolidation cycle complete"
        );
        Ok(report)
    }
}

fn is_duplicate(first: &MemoryRecord, other: &MemoryRecord) -> bool {
    if first.key == other.key {
        return true;
    }
    match (first.description(), other.description()) {
        (Some(a), Some(b)) => first.tags == other.tags && a == b,
        _ => false,
    }
}

fn severity_factor(record: &MemoryRecord) -> f64 {
    let level = record
        .value_str("severity")
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let has = |tags: &[&str]| record.has_any_tag(tags) || tags.iter().any(|t| *t == level);
    if has(&SEVERITY_CRITICAL_TAGS[..]) {
        20.0
    } else if has(&SEVERITY_HIGH_TAGS[..]) {
        15.0
    } else if has(&SEVERITY_MEDIUM_TAGS[..]) {
        10.0
    } else {
        0.0
    }
}

fn drift_risk_factor(record: &MemoryRecord, stale: bool) -> f64 {
    if record.has_any_tag(&DRIFT_RISK_TAGS) {
        10.0
    } else if record.has_any_tag(&DRIFT_WATCH_TAGS) && !stale {
        5.0
    } else {
        0.0
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

const ELLIPSIS: &str = "...";

/// Cut `text` to at most `max_chars` characters, ellipsis included.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars < ELLIPSIS.len() {
        return text.chars().take(max_chars).collect();
    }
    let cut: String = text.chars().take(max_chars - ELLIPSIS.len()).collect();
    format!("{}{}", cut.trim_end(), ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryBackend, Scope};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(id: &str, scope: Scope, tags: &[&str], description: &str, age_days: i64) -> MemoryRecord {
        let at = now() - Duration::days(age_days) + Duration::seconds(id.len() as i64);
        let mut r = MemoryRecord::new(
            scope,
            format!("key-{}", id),
            json!({ "description": description }),
            tags.iter().copied(),
            "test",
            at,
        );
        r.id = id.to_string();
        r
    }

    fn engine() -> (ConsolidationEngine, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        let engine = ConsolidationEngine::new(
            ConsolidationConfig::default(),
            Arc::new(KnowledgeStore::new(backend.clone())),
            Arc::new(ArchiveIndex::new(backend.clone())),
        );
        (engine, backend)
    }

    fn qa_records() -> Vec<MemoryRecord> {
        (1..=5)
            .map(|i| {
                record(
                    &format!("qa{}", i),
                    Scope::Global,
                    &["qa_failure"],
                    &format!("Login test {} failed on CI", i),
                    1,
                )
            })
            .collect()
    }

    #[test]
    fn test_detect_patterns() {
        let (engine, _) = engine();
        let mut records = qa_records();
        records.push(record("n1", Scope::Global, &["note"], "one-off", 1));

        let patterns = engine.detect_patterns(&records);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].tag, "qa_failure");
        assert_eq!(patterns[0].occurrences, 5);
        assert_eq!(patterns[0].category, PatternCategory::QaPattern);
        assert!((patterns[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_retired_and_ignored_tags_do_not_form_patterns() {
        let (engine, _) = engine();
        let mut records = qa_records();
        for r in records.iter_mut().take(3) {
            r.tags.insert("_retired".to_string());
        }
        assert!(engine.detect_patterns(&records).is_empty());
    }

    #[test]
    fn test_find_duplicates() {
        let (engine, _) = engine();
        let a = record("a", Scope::Global, &["lesson"], "Same text", 3);
        let b = record("b", Scope::Global, &["lesson"], "Same text", 2);
        let mut c = record("c", Scope::Global, &["other"], "Different", 1);
        c.key = a.key.clone();
        let d = record("d", Scope::Agent, &["lesson"], "Unique", 1);

        let groups = engine.find_duplicates(&[d, c, b, a]);
        assert_eq!(
            groups,
            vec![DuplicateGroup {
                kept_id: "a".to_string(),
                collapsed_ids: vec!["b".to_string(), "c".to_string()],
            }]
        );
    }

    #[test]
    fn test_same_key_in_different_scopes_is_duplicate() {
        let (engine, _) = engine();
        let global = record("g", Scope::Global, &["lesson"], "Cache warmup", 2);
        let mut project = record("p", Scope::project("alpha"), &["issue"], "Other text", 1);
        project.key = global.key.clone();

        let groups = engine.find_duplicates(&[project, global]);
        assert_eq!(
            groups,
            vec![DuplicateGroup {
                kept_id: "g".to_string(),
                collapsed_ids: vec!["p".to_string()],
            }]
        );
    }

    #[test]
    fn test_scores_are_bounded_and_classified() {
        let (engine, _) = engine();
        let mut records = qa_records();
        records.push(record(
            "gov",
            Scope::project("alpha"),
            &["governance", "critical", "architecture_decision", "qa_failure"],
            "Mandatory QA",
            1,
        ));
        let patterns = engine.detect_patterns(&records);
        let duplicates = engine.find_duplicates(&records);
        let scores = engine.score_records(&records, &patterns, &duplicates, now());

        assert_eq!(scores.len(), 6);
        for s in &scores {
            assert!(s.score >= 0.0 && s.score <= 100.0);
            assert_eq!(s.classification, Significance::classify(s.score));
        }
        let gov = scores.iter().find(|s| s.record_id == "gov").unwrap();
        // 6 occurrences -> 25, critical -> 20, one project -> 5, governance 15, drift 10
        assert_eq!(gov.score, 75.0);
        assert_eq!(gov.recommendation, Recommendation::Consolidate);

        // 25 frequency + 5 breadth from the project record in the same group
        let qa = scores.iter().find(|s| s.record_id == "qa1").unwrap();
        assert_eq!(qa.score, 30.0);
        assert_eq!(qa.recommendation, Recommendation::Archive);
    }

    #[test]
    fn test_duplicates_are_recommended_for_deletion() {
        let (engine, _) = engine();
        let records = vec![
            record("a", Scope::Global, &["note"], "Same", 2),
            record("b", Scope::Global, &["note"], "Same", 1),
        ];
        let duplicates = engine.find_duplicates(&records);
        let scores = engine.score_records(&records, &[], &duplicates, now());
        let b = scores.iter().find(|s| s.record_id == "b").unwrap();
        assert_eq!(b.recommendation, Recommendation::Delete);
        // recurrence: two identical descriptions -> 5
        assert_eq!(b.factors.recurrence, 5.0);
    }

    #[test]
    fn test_generate_blocks() {
        let (engine, _) = engine();
        let records = qa_records();
        let patterns = engine.detect_patterns(&records);
        let (blocks, rejected) = engine.generate_blocks(&patterns, &records, &[], now());

        assert_eq!(rejected, 0);
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.origin_record_ids.len(), 5);
        assert_eq!(block.category, PatternCategory::QaPattern);
        assert_eq!(block.summary, "Login test 1 failed on CI (observed 5 times)");
        assert!(block.lesson.contains("'qa_failure' recurred 5 times"));
        assert_eq!(block.applies_to, vec!["global"]);
        assert_eq!(block.importance, Importance::Medium);
        assert_eq!(block.governance_links, vec!["governance/qa-gate.md"]);

        let (again, rejected) = engine.generate_blocks(&patterns, &records, &blocks, now());
        assert!(again.is_empty());
        assert_eq!(rejected, 1);
    }

    #[test]
    fn test_block_links_projects_and_importance() {
        let (engine, _) = engine();
        let mut records: Vec<MemoryRecord> = (0..3)
            .map(|i| record(&format!("p{}", i), Scope::project("alpha"), &["deploy"], "Rollout stalled", 1))
            .collect();
        records[0].tags.insert("blocker".to_string());
        records.push(record("q", Scope::project("beta"), &["deploy"], "Canary failed", 1));

        let patterns: Vec<_> = engine
            .detect_patterns(&records)
            .into_iter()
            .filter(|p| p.tag == "deploy")
            .collect();
        let (blocks, _) = engine.generate_blocks(&patterns, &records, &[], now());
        assert_eq!(blocks[0].applies_to, vec!["alpha", "beta"]);
        assert_eq!(blocks[0].importance, Importance::Critical);
    }

    #[test]
    fn test_summary_truncation() {
        assert_eq!(truncate("short", 10), "short");
        let long = "x".repeat(600);
        let cut = truncate(&long, 480);
        assert_eq!(cut.chars().count(), 480);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate(&long, 2), "xx");
    }

    #[test]
    fn test_plan_archival_only_old_low_records() {
        let (engine, _) = engine();
        let records = vec![
            record("old", Scope::Global, &["note"], "stale note", 200),
            record("new", Scope::Global, &["note2"], "fresh note", 10),
        ];
        let scores = engine.score_records(&records, &[], &[], now());
        let refs = engine.plan_archival(&records, &scores, now());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].record_id, "old");
        assert_eq!(refs[0].retain_until, now() + Duration::days(365));
    }

    #[test]
    fn test_should_trigger() {
        let (engine, _) = engine();
        assert!(!engine.should_trigger(29));
        assert!(engine.should_trigger(30));
    }

    #[tokio::test]
    async fn test_full_cycle_is_additive() {
        let (engine, backend) = engine();
        let store = MemoryStore::new(backend.clone(), true);
        for r in qa_records() {
            store.insert(r).await.unwrap();
        }
        store
            .insert(record("old", Scope::Global, &["note"], "ancient", 400))
            .await
            .unwrap();

        let report = engine
            .run_at(&store, ConsolidationTrigger::Manual, now())
            .await
            .unwrap();
        assert_eq!(report.records_analyzed, 6);
        assert_eq!(report.blocks_created.len(), 1);
        assert_eq!(report.records_archived, vec!["old"]);
        assert!(report.failures.is_empty());

        // Originals untouched
        assert_eq!(store.all_records().await.len(), 6);

        // Second cycle creates nothing new
        let second = engine
            .run_at(&store, ConsolidationTrigger::Periodic, now())
            .await
            .unwrap();
        assert!(second.blocks_created.is_empty());
        assert_eq!(second.blocks_rejected, 1);
        assert!(second.records_archived.is_empty());
    }
}
