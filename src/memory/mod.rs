//! Memory fabric: records, typed payloads, storage and routing
//!
//! - [`record`]: the `MemoryRecord` unit and its scopes
//! - [`schema`]: tagged payload variants validated at the store boundary
//! - [`backend`]: the `DocumentStore` interface and its implementations
//! - [`store`]: record CRUD over a backend
//! - [`router`]: pure rule-table record selection

pub mod backend;
pub mod record;
pub mod router;
pub mod schema;
pub mod store;

pub use backend::{Document, DocumentStore, FileBackend, InMemoryBackend};
pub use record::{MemoryRecord, Scope, ScopeKind, RETIRED_MARKER};
pub use router::{ContextSufficiency, MemoryRouter, RiskLevel, RouteFilter, RouteResult};
pub use schema::{
    DecisionPayload, Difficulty, FeedbackPayload, GovernanceRulePayload, IssuePayload,
    LessonPayload, PatternPayload, Payload, PayloadKind, UsagePayload,
};
pub use store::{MemoryStore, ScopedRecords, StoreSnapshot};
