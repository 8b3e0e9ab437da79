//! Memory store over a [`DocumentStore`] backend
//!
//! Provides the record-level CRUD operations of the memory fabric. Records
//! of each scope live in their own collection, keyed by record id.

use super::backend::{Document, DocumentStore};
use super::record::{MemoryRecord, Scope, RETIRED_MARKER};
use super::schema::Payload;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Records grouped by partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedRecords {
    pub global: Vec<MemoryRecord>,
    pub agent: Vec<MemoryRecord>,
    /// project id -> records
    pub projects: BTreeMap<String, Vec<MemoryRecord>>,
}

/// Point-in-time view of the store consumed by the drift monitor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// All records, ordered by id
    pub records: Vec<MemoryRecord>,
    /// Existing partition collections
    pub partitions: BTreeSet<String>,
}

impl StoreSnapshot {
    pub fn new(mut records: Vec<MemoryRecord>, partitions: BTreeSet<String>) -> Self {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            records,
            partitions,
        }
    }
}

/// Record store for the memory fabric
pub struct MemoryStore {
    backend: Arc<dyn DocumentStore>,
    strict_schema: bool,
}

impl MemoryStore {
    /// Create a store over the given backend
    pub fn new(backend: Arc<dyn DocumentStore>, strict_schema: bool) -> Self {
        Self {
            backend,
            strict_schema,
        }
    }

    /// Shared handle to the backend
    pub fn backend(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.backend)
    }

    /// Create the global and agent partitions.
    pub async fn initialize(&self) -> Result<()> {
        for scope in [Scope::Global, Scope::Agent] {
            self.backend.create_collection(&scope.collection()).await?;
        }
        Ok(())
    }

    fn validate(&self, tags: &BTreeSet<String>, value: &Value) -> Result<()> {
        if self.strict_schema {
            Payload::parse(tags, value)?;
        }
        Ok(())
    }

    /// Append a new record (version 1, fresh id and timestamps).
    pub async fn write(
        &self,
        scope: Scope,
        key: &str,
        value: Value,
        tags: Vec<String>,
        created_by: &str,
    ) -> Result<MemoryRecord> {
        let record = MemoryRecord::new(scope, key, value, tags, created_by, Utc::now());
        self.insert(record).await
    }

    /// Store a fully built record. The id must be new.
    pub async fn insert(&self, record: MemoryRecord) -> Result<MemoryRecord> {
        match record.version {
            Some(v) if v >= 1 => {}
            other => {
                return Err(Error::Schema(format!(
                    "record {} has invalid version {:?}; versions start at 1",
                    record.id, other
                )))
            }
        }
        if record.key.trim().is_empty() {
            return Err(Error::Schema("record key must not be empty".to_string()));
        }
        self.validate(&record.tags, &record.value)?;

        let body = serde_json::to_value(&record)?;
        self.backend
            .put(&record.scope.collection(), &record.id, body, Some(0))
            .await?;
        tracing::debug!(
            id = %record.id,
            scope = %record.scope,
            key = %record.key,
            "Memory record written"
        );
        Ok(record)
    }

    /// Records of a scope, optionally narrowed to a key and to records
    /// carrying any of `tags`. Ordered by creation time, then id.
    ///
    /// A failed backend read yields no records.
    pub async fn read(
        &self,
        scope: &Scope,
        key: Option<&str>,
        tags: Option<&[String]>,
    ) -> Vec<MemoryRecord> {
        let mut records: Vec<MemoryRecord> = self
            .scan_collection(&scope.collection())
            .await
            .into_iter()
            .map(|(_, record)| record)
            .filter(|r| &r.scope == scope)
            .filter(|r| key.map_or(true, |k| r.key == k))
            .filter(|r| tags.map_or(true, |t| t.is_empty() || r.has_any_tag(t)))
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Delete every record with `key` in `scope`. Returns whether any existed.
    pub async fn delete(&self, scope: &Scope, key: &str) -> Result<bool> {
        let mut deleted = false;
        for (doc_key, record) in self.scan_collection(&scope.collection()).await {
            if &record.scope == scope && record.key == key {
                deleted |= self.backend.delete(&scope.collection(), &doc_key).await?;
            }
        }
        Ok(deleted)
    }

    /// Delete every record in `scope`, returning how many were removed.
    pub async fn clear(&self, scope: &Scope) -> Result<usize> {
        let collection = scope.collection();
        let mut removed = 0;
        for (doc_key, record) in self.scan_collection(&collection).await {
            if &record.scope == scope && self.backend.delete(&collection, &doc_key).await? {
                removed += 1;
            }
        }
        tracing::info!(scope = %scope, removed, "Cleared memory scope");
        Ok(removed)
    }

    /// All records grouped by partition.
    pub async fn get_all(&self) -> ScopedRecords {
        let mut grouped = ScopedRecords::default();
        for record in self.all_records().await {
            match &record.scope {
                Scope::Global => grouped.global.push(record),
                Scope::Agent => grouped.agent.push(record),
                Scope::Project(_) => {
                    let project = record
                        .project_id()
                        .unwrap_or_else(|| "unassigned".to_string());
                    grouped.projects.entry(project).or_default().push(record);
                }
            }
        }
        grouped
    }

    /// Every record in every partition, ordered by id.
    pub async fn all_records(&self) -> Vec<MemoryRecord> {
        let mut records = Vec::new();
        for collection in self.partitions().await {
            records.extend(
                self.scan_collection(&collection)
                    .await
                    .into_iter()
                    .map(|(_, record)| record),
            );
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Existing record partitions (collection names).
    pub async fn partitions(&self) -> BTreeSet<String> {
        match self.backend.collections().await {
            Ok(collections) => collections
                .into_iter()
                .filter(|c| Scope::is_partition(c))
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to list memory partitions: {}", e);
                BTreeSet::new()
            }
        }
    }

    /// Snapshot of records and partitions for drift analysis.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let records = self.all_records().await;
        let partitions = self.partitions().await;
        StoreSnapshot::new(records, partitions)
    }

    /// Find a record by id.
    pub async fn get(&self, id: &str) -> Option<MemoryRecord> {
        for collection in self.partitions().await {
            match self.backend.get(&collection, id).await {
                Ok(Some(doc)) => return decode_record(&collection, doc),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to read {}/{}: {}", collection, id, e),
            }
        }
        None
    }

    /// Replace a record's value, bumping its version.
    ///
    /// Fails with [`Error::VersionConflict`] when `expected_version` is not
    /// the stored version.
    pub async fn update(&self, id: &str, value: Value, expected_version: i64) -> Result<MemoryRecord> {
        self.modify(id, Some(expected_version), |record| {
            record.value = value;
        })
        .await
    }

    /// Apply the `_retired` overlay to a record.
    ///
    /// Works on records without a usable version (imported documents); the
    /// write is still guarded by the backend document version.
    pub async fn mark_retired(&self, id: &str) -> Result<MemoryRecord> {
        self.modify(id, None, |record| {
            record.tags.insert(RETIRED_MARKER.to_string());
        })
        .await
    }

    /// Load, change and store a record. `expected_version` of `None` skips
    /// the record version check.
    async fn modify<F>(
        &self,
        id: &str,
        expected_version: Option<i64>,
        apply: F,
    ) -> Result<MemoryRecord>
    where
        F: FnOnce(&mut MemoryRecord),
    {
        let (collection, doc) = self.find_document(id).await?;
        let mut record: MemoryRecord = serde_json::from_value(doc.body)?;

        if let Some(expected) = expected_version {
            if record.version != Some(expected) {
                return Err(Error::VersionConflict {
                    collection,
                    key: id.to_string(),
                    expected: u64::try_from(expected).ok(),
                    found: record.version.and_then(|v| u64::try_from(v).ok()),
                });
            }
        }

        apply(&mut record);
        self.validate(&record.tags, &record.value)?;
        record.version = Some(record.version.unwrap_or(0).max(0) + 1);
        record.updated_at = Utc::now().max(record.updated_at);

        let body = serde_json::to_value(&record)?;
        self.backend
            .put(&collection, id, body, Some(doc.version))
            .await?;
        tracing::debug!(id = %id, version = ?record.version, "Memory record updated");
        Ok(record)
    }

    async fn find_document(&self, id: &str) -> Result<(String, Document)> {
        for collection in self.partitions().await {
            if let Some(doc) = self.backend.get(&collection, id).await? {
                return Ok((collection, doc));
            }
        }
        Err(Error::Store(format!("Record not found: {}", id)))
    }

    async fn scan_collection(&self, collection: &str) -> Vec<(String, MemoryRecord)> {
        match self.backend.scan(collection).await {
            Ok(docs) => docs
                .into_iter()
                .filter_map(|doc| {
                    let key = doc.key.clone();
                    decode_record(collection, doc).map(|r| (key, r))
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to scan {}: {}", collection, e);
                Vec::new()
            }
        }
    }
}

fn decode_record(collection: &str, doc: Document) -> Option<MemoryRecord> {
    match serde_json::from_value::<MemoryRecord>(doc.body) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Skipping malformed record {}/{}: {}", collection, doc.key, e);
            None
        }
    }
}
