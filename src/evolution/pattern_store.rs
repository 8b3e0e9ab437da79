//! Persistence of the consolidated pattern document

use super::types::ConsolidatedPatternSet;
use crate::error::{Error, Result};
use crate::memory::DocumentStore;
use std::sync::Arc;

const COLLECTION: &str = "patterns";
const KEY: &str = "consolidated";

pub struct PatternStore {
    backend: Arc<dyn DocumentStore>,
}

impl PatternStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    /// The last saved set, if any.
    pub async fn load(&self) -> Result<Option<ConsolidatedPatternSet>> {
        match self.backend.get(COLLECTION, KEY).await? {
            Some(doc) => serde_json::from_value(doc.body)
                .map(Some)
                .map_err(|e| Error::Evolution(format!("Corrupt consolidated pattern set: {}", e))),
            None => Ok(None),
        }
    }

    /// Replace the stored set.
    pub async fn save(&self, set: &ConsolidatedPatternSet) -> Result<()> {
        let body = serde_json::to_value(set)?;
        self.backend.put(COLLECTION, KEY, body, None).await?;
        tracing::info!(
            total = set.total_patterns,
            stable = set.stable_patterns,
            monitored = set.monitored_patterns,
            retirement = set.retirement_candidates,
            "Consolidated pattern set saved"
        );
        Ok(())
    }
}
