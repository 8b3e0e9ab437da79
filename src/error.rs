//! memgov error types

use thiserror::Error;

/// memgov error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document store / memory store error
    #[error("Store error: {0}")]
    Store(String),

    /// Optimistic concurrency check failed on a write
    #[error("Version conflict on {collection}/{key}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        /// Collection the document lives in
        collection: String,
        /// Document key
        key: String,
        /// Version the writer expected
        expected: Option<u64>,
        /// Version actually stored
        found: Option<u64>,
    },

    /// Payload failed typed validation at the store boundary
    #[error("Schema error: {0}")]
    Schema(String),

    /// Drift monitor error
    #[error("Drift error: {0}")]
    Drift(String),

    /// The drift monitor blocked execution
    #[error("Execution blocked by drift monitor: {reason}. Recommendation: {recommendation}")]
    ExecutionBlocked {
        /// Summary of the blocking issues
        reason: String,
        /// Actionable next step
        recommendation: String,
    },

    /// A governance rule was violated by the request
    #[error("Governance violation: {reason}. Recommendation: {recommendation}")]
    Governance {
        /// What was violated
        reason: String,
        /// Actionable next step
        recommendation: String,
    },

    /// Consolidation engine error
    #[error("Consolidation error: {0}")]
    Consolidation(String),

    /// Evolution engine error
    #[error("Evolution error: {0}")]
    Evolution(String),

    /// Reasoning orchestrator error
    #[error("Reasoning error: {0}")]
    Reasoning(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error represents a hard stop that callers must not retry
    /// without changing the memory fabric or the request.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Error::ExecutionBlocked { .. } | Error::Governance { .. }
        )
    }
}

/// Result type alias for memgov operations
pub type Result<T> = std::result::Result<T, Error>;
