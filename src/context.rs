//! Pipeline context: every stage constructed once and passed explicitly
//!
//! `GovernanceContext` owns the backend and all components built on it.
//! Drift scans, consolidation and evolution cycles share one cycle lock so
//! they never run concurrently against the same store.

use crate::config::{BackendKind, GovernanceConfig};
use crate::consolidation::{
    ArchiveIndex, ConsolidationEngine, ConsolidationReport, ConsolidationTrigger, KnowledgeStore,
};
use crate::drift::{DriftMonitor, DriftReport};
use crate::error::Result;
use crate::evolution::{EventLog, EvolutionEngine, EvolutionReport, PatternStore};
use crate::memory::{DocumentStore, FileBackend, InMemoryBackend, MemoryRouter, MemoryStore};
use crate::reasoning::{PatternLibrary, ReasoningOrchestrator, ReasoningRequest, ReasoningResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct GovernanceContext {
    config: GovernanceConfig,
    store: Arc<MemoryStore>,
    knowledge: Arc<KnowledgeStore>,
    archive: Arc<ArchiveIndex>,
    patterns: Arc<PatternStore>,
    events: Arc<EventLog>,
    drift: Arc<DriftMonitor>,
    consolidation: ConsolidationEngine,
    evolution: EvolutionEngine,
    orchestrator: ReasoningOrchestrator,
    cycle_lock: Mutex<()>,
}

impl GovernanceContext {
    /// Open the backend named by `config.storage` and build the pipeline.
    pub async fn open(config: GovernanceConfig) -> Result<Self> {
        let backend: Arc<dyn DocumentStore> = match config.storage.backend {
            BackendKind::File => Arc::new(FileBackend::open(config.storage.base_dir.clone()).await?),
            BackendKind::Memory => Arc::new(InMemoryBackend::new()),
        };
        Self::with_backend(config, backend).await
    }

    /// Build the pipeline over an existing backend.
    pub async fn with_backend(
        config: GovernanceConfig,
        backend: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(MemoryStore::new(backend.clone(), config.storage.strict_schema));
        store.initialize().await?;

        let knowledge = Arc::new(KnowledgeStore::new(backend.clone()));
        let archive = Arc::new(ArchiveIndex::new(backend.clone()));
        let patterns = Arc::new(PatternStore::new(backend.clone()));
        let events = Arc::new(EventLog::new(backend, config.evolution.max_events));
        let drift = Arc::new(DriftMonitor::new(config.drift.clone())?);

        let consolidation = ConsolidationEngine::new(
            config.consolidation.clone(),
            knowledge.clone(),
            archive.clone(),
        );
        let evolution =
            EvolutionEngine::new(config.evolution.clone(), patterns.clone(), events.clone());
        let orchestrator = ReasoningOrchestrator::new(
            config.reasoning.clone(),
            &config.consolidation,
            store.clone(),
            MemoryRouter::new(config.router.clone()),
            drift.clone(),
            knowledge.clone(),
            patterns.clone(),
        );

        tracing::info!(
            backend = ?config.storage.backend,
            strict_schema = config.storage.strict_schema,
            "Governance context ready"
        );

        Ok(Self {
            config,
            store,
            knowledge,
            archive,
            patterns,
            events,
            drift,
            consolidation,
            evolution,
            orchestrator,
            cycle_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeStore> {
        &self.knowledge
    }

    pub fn archive(&self) -> &Arc<ArchiveIndex> {
        &self.archive
    }

    pub fn patterns(&self) -> &Arc<PatternStore> {
        &self.patterns
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    pub fn drift(&self) -> &Arc<DriftMonitor> {
        &self.drift
    }

    pub fn consolidation(&self) -> &ConsolidationEngine {
        &self.consolidation
    }

    pub fn evolution(&self) -> &EvolutionEngine {
        &self.evolution
    }

    pub fn orchestrator(&self) -> &ReasoningOrchestrator {
        &self.orchestrator
    }

    /// Run a drift scan.
    pub async fn scan_drift(&self) -> DriftReport {
        self.scan_drift_at(Utc::now()).await
    }

    pub async fn scan_drift_at(&self, now: DateTime<Utc>) -> DriftReport {
        let _guard = self.cycle_lock.lock().await;
        self.drift.run_at(&self.store, now).await
    }

    /// Run a consolidation cycle.
    pub async fn consolidate(&self, trigger: ConsolidationTrigger) -> Result<ConsolidationReport> {
        self.consolidate_at(trigger, Utc::now()).await
    }

    pub async fn consolidate_at(
        &self,
        trigger: ConsolidationTrigger,
        now: DateTime<Utc>,
    ) -> Result<ConsolidationReport> {
        let _guard = self.cycle_lock.lock().await;
        self.consolidation.run_at(&self.store, trigger, now).await
    }

    /// Run a threshold-triggered cycle when the record count calls for one.
    pub async fn consolidate_if_due(&self) -> Result<Option<ConsolidationReport>> {
        let count = self.store.all_records().await.len();
        if !self.consolidation.should_trigger(count) {
            tracing::debug!(records = count, "Consolidation not due");
            return Ok(None);
        }
        self.consolidate(ConsolidationTrigger::Threshold).await.map(Some)
    }

    /// Run an evolution cycle over the current pattern library.
    pub async fn evolve(&self) -> Result<EvolutionReport> {
        self.evolve_at(Utc::now()).await
    }

    pub async fn evolve_at(&self, now: DateTime<Utc>) -> Result<EvolutionReport> {
        let _guard = self.cycle_lock.lock().await;
        let records = self.store.all_records().await;
        let library = PatternLibrary::load(&records, &self.patterns).await;
        self.evolution
            .run_at(&self.store, library.to_patterns(), now)
            .await
    }

    /// Current pattern library.
    pub async fn pattern_library(&self) -> PatternLibrary {
        PatternLibrary::load(&self.store.all_records().await, &self.patterns).await
    }

    /// Produce a governed decision.
    pub async fn reason(&self, request: &ReasoningRequest) -> Result<ReasoningResult> {
        self.orchestrator.reason(request).await
    }

    pub async fn reason_at(
        &self,
        request: &ReasoningRequest,
        now: DateTime<Utc>,
    ) -> Result<ReasoningResult> {
        self.orchestrator.reason_at(request, now).await
    }
}
