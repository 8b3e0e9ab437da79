//! memgov - Memory Governance & Reasoning Pipeline
//!
//! memgov decides what an autonomous build agent is allowed to know and do
//! next. It keeps an append-style record store (the memory fabric) and runs
//! four deterministic, rule-based analysis stages over it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Reasoning Orchestrator                      │
//! │  intent check → drift check → load → filter → merge → route      │
//! │  → governance check → pattern match → risk → decision → actions  │
//! └──────┬──────────────┬───────────────┬───────────────┬────────────┘
//!        │              │               │               │
//! ┌──────▼──────┐ ┌─────▼──────┐ ┌──────▼───────┐ ┌─────▼──────────┐
//! │ Drift       │ │ Memory     │ │ Knowledge    │ │ Pattern        │
//! │ Monitor     │ │ Router     │ │ blocks       │ │ library        │
//! │ (9 checks)  │ │ (pure)     │ │              │ │                │
//! └──────┬──────┘ └─────┬──────┘ └──────▲───────┘ └─────▲──────────┘
//!        │              │               │               │
//!        │              │        ┌──────┴───────┐ ┌─────┴──────────┐
//!        │              │        │ Consolidation│ │ Evolution      │
//!        │              │        │ Engine       │ │ Engine         │
//!        │              │        └──────▲───────┘ └─────▲──────────┘
//! ┌──────▼──────────────▼───────────────┴───────────────┴────────────┐
//! │                  Memory Store (DocumentStore backend)            │
//! │      global/   agent/   project-<id>/   knowledge/   patterns/   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Consolidation and evolution run as side cycles, manually or from the
//! background maintenance loop, and write the derived sets that later
//! reasoning runs consume.
//!
//! ## Modules
//!
//! - [`memory`]: records, typed payloads, storage backends and routing
//! - [`drift`]: the drift monitor and its nine checks
//! - [`consolidation`]: pattern detection, scoring and knowledge blocks
//! - [`evolution`]: pattern scoring from usage and the governance event log
//! - [`reasoning`]: the pattern library and the decision state machine
//! - [`context`]: the explicitly constructed pipeline
//! - [`maintenance`]: the periodic background loop
//! - [`config`]: configuration management

pub mod config;
pub mod consolidation;
pub mod context;
pub mod drift;
pub mod error;
pub mod evolution;
pub mod maintenance;
pub mod memory;
pub mod reasoning;

pub use config::GovernanceConfig;
pub use context::GovernanceContext;
pub use error::{Error, Result};
