//! Outcome statistics
//!
//! Per-entity score history for subjects, organizations and platforms, used
//! to spot quality regressions across runs.

pub mod record;
pub mod store;

pub use record::{
    EntityKind, OutcomeRecord, RegressionFlag, ScoreEntry, HISTORY_CAPACITY, REGRESSION_THRESHOLD,
};
pub use store::{OutcomeMemoryStore, OutcomeUpdate};
