//! Capped, append-only governance event log

use super::types::EvolutionEvent;
use crate::error::{Error, Result};
use crate::memory::DocumentStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const COLLECTION: &str = "governance";
const KEY: &str = "events";

/// Hex SHA-256 over the evidence ids, one per line.
pub fn evidence_digest(evidence: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(evidence.join("\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Governance event log holding the most recent `capacity` events
pub struct EventLog {
    backend: Arc<dyn DocumentStore>,
    capacity: usize,
}

impl EventLog {
    pub fn new(backend: Arc<dyn DocumentStore>, capacity: usize) -> Self {
        Self { backend, capacity }
    }

    /// Events oldest first.
    pub async fn list(&self) -> Result<Vec<EvolutionEvent>> {
        Ok(self.load().await?.0)
    }

    /// Append events, dropping the oldest beyond capacity.
    pub async fn append(&self, events: &[EvolutionEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let (mut log, version) = self.load().await?;
        log.extend_from_slice(events);
        if log.len() > self.capacity {
            let excess = log.len() - self.capacity;
            log.drain(..excess);
        }
        let body = serde_json::to_value(&log)?;
        self.backend.put(COLLECTION, KEY, body, Some(version)).await?;
        tracing::debug!(appended = events.len(), total = log.len(), "Governance events recorded");
        Ok(())
    }

    async fn load(&self) -> Result<(Vec<EvolutionEvent>, u64)> {
        match self.backend.get(COLLECTION, KEY).await? {
            Some(doc) => {
                let log = serde_json::from_value(doc.body)
                    .map_err(|e| Error::Evolution(format!("Corrupt governance event log: {}", e)))?;
                Ok((log, doc.version))
            }
            None => Ok((Vec::new(), 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::types::PatternClass;
    use crate::memory::InMemoryBackend;
    use chrono::Utc;

    fn event(n: usize) -> EvolutionEvent {
        let evidence = vec![format!("u{}", n)];
        EvolutionEvent {
            id: format!("evt-{}", n),
            pattern_id: "p".to_string(),
            previous_score: None,
            new_score: 0.5,
            classification: PatternClass::Monitored,
            confidence: 0.6,
            reason: "test".to_string(),
            evidence_digest: evidence_digest(&evidence),
            evidence,
            applied_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_log_is_capped_to_most_recent() {
        let log = EventLog::new(Arc::new(InMemoryBackend::new()), 3);
        let batch: Vec<_> = (0..2).map(event).collect();
        log.append(&batch).await.unwrap();
        let batch: Vec<_> = (2..5).map(event).collect();
        log.append(&batch).await.unwrap();

        let ids: Vec<String> = log.list().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["evt-2", "evt-3", "evt-4"]);
    }

    #[test]
    fn test_digest_is_stable() {
        let a = evidence_digest(&["u1".to_string(), "u2".to_string()]);
        let b = evidence_digest(&["u1".to_string(), "u2".to_string()]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, evidence_digest(&["u2".to_string(), "u1".to_string()]));
    }
}
