//! Drift detection over the memory fabric
//!
//! Nine independent checks validate the store's internal consistency:
//!
//! | Check            | Finds                                              |
//! |------------------|----------------------------------------------------|
//! | schema           | typed records that fail their payload schema       |
//! | version          | missing or invalid record versions                 |
//! | contradiction    | opposing architecture decisions                    |
//! | staleness        | records past their category's age threshold        |
//! | cross_agent      | missing shared partitions                          |
//! | project          | projects without milestones or phase transitions   |
//! | pattern          | reasoning patterns missing required fields         |
//! | governance       | mandatory claims, stored secrets, skip-memory flags|
//! | agent_experience | builder feedback trends                            |
//!
//! A report blocks execution on any critical issue (when configured) or
//! once error issues reach the configured threshold.

pub mod checks;
pub mod contradiction;
pub mod monitor;
pub mod secrets;
pub mod types;

pub use contradiction::{
    Contradiction, ContradictionDetector, MatchStrength, RegexContradictionDetector,
};
pub use monitor::{ensure_not_blocked, DriftMonitor};
pub use secrets::{RegexSecretDetector, SecretDetector, SecretFinding};
pub use types::{DriftIssue, DriftReport, DriftSeverity, DriftStatus, DriftType};
