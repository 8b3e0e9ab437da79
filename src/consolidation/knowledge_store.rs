//! Knowledge block and archive persistence
//!
//! Knowledge blocks live in the `knowledge` collection as one array
//! document per category. Blocks are appended, never replaced. Archive
//! references live in the `archive` collection keyed by record id.

use super::types::{ArchiveReference, KnowledgeBlock, PatternCategory};
use crate::error::{Error, Result};
use crate::memory::DocumentStore;
use std::sync::Arc;

const KNOWLEDGE_COLLECTION: &str = "knowledge";
const ARCHIVE_COLLECTION: &str = "archive";

/// Append-only store of knowledge blocks
pub struct KnowledgeStore {
    backend: Arc<dyn DocumentStore>,
}

impl KnowledgeStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    /// Blocks of one category, in insertion order.
    pub async fn blocks(&self, category: PatternCategory) -> Result<Vec<KnowledgeBlock>> {
        Ok(self.load(category).await?.0)
    }

    /// Blocks of every category. Unreadable categories are skipped.
    pub async fn all(&self) -> Vec<KnowledgeBlock> {
        let mut out = Vec::new();
        for category in PatternCategory::ALL {
            match self.blocks(category).await {
                Ok(blocks) => out.extend(blocks),
                Err(e) => tracing::warn!("Failed to load {} knowledge blocks: {}", category, e),
            }
        }
        out
    }

    /// Append a block unless it overlaps an existing one in its category.
    ///
    /// Returns `Ok(false)` for a rejected duplicate.
    pub async fn append(&self, block: KnowledgeBlock) -> Result<bool> {
        block.validate()?;
        let (mut blocks, version) = self.load(block.category).await?;
        if blocks.iter().any(|existing| existing.overlaps(&block)) {
            tracing::debug!(category = %block.category, "Rejected duplicate knowledge block");
            return Ok(false);
        }

        let category = block.category;
        let id = block.id.clone();
        blocks.push(block);
        let body = serde_json::to_value(&blocks)?;
        self.backend
            .put(KNOWLEDGE_COLLECTION, category.as_str(), body, Some(version))
            .await?;
        tracing::info!(id = %id, category = %category, "Knowledge block stored");
        Ok(true)
    }

    async fn load(&self, category: PatternCategory) -> Result<(Vec<KnowledgeBlock>, u64)> {
        match self.backend.get(KNOWLEDGE_COLLECTION, category.as_str()).await? {
            Some(doc) => {
                let blocks = serde_json::from_value(doc.body).map_err(|e| {
                    Error::Consolidation(format!(
                        "Corrupt knowledge document for {}: {}",
                        category, e
                    ))
                })?;
                Ok((blocks, doc.version))
            }
            None => Ok((Vec::new(), 0)),
        }
    }
}

/// Index of records marked for archival
pub struct ArchiveIndex {
    backend: Arc<dyn DocumentStore>,
}

impl ArchiveIndex {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    pub async fn contains(&self, record_id: &str) -> Result<bool> {
        Ok(self
            .backend
            .get(ARCHIVE_COLLECTION, record_id)
            .await?
            .is_some())
    }

    /// Record an archive reference. Existing references are left untouched.
    pub async fn insert(&self, reference: &ArchiveReference) -> Result<()> {
        let body = serde_json::to_value(reference)?;
        self.backend
            .put(ARCHIVE_COLLECTION, &reference.record_id, body, Some(0))
            .await?;
        Ok(())
    }

    /// All archive references, ordered by record id.
    pub async fn list(&self) -> Result<Vec<ArchiveReference>> {
        let docs = self.backend.scan(ARCHIVE_COLLECTION).await?;
        let mut refs = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value(doc.body) {
                Ok(r) => refs.push(r),
                Err(e) => tracing::warn!("Skipping malformed archive entry {}: {}", doc.key, e),
            }
        }
        Ok(refs)
    }
}
