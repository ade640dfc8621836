//! Surface driver contract
//!
//! The engine treats the interactive surface as an opaque, exclusive resource.
//! Drivers must be safe to call repeatedly; failures come back as values and
//! never abort the engine.

use async_trait::async_trait;

use crate::types::{Action, Observation};

/// Errors a surface driver reports for a single call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("action failed: {0}")]
    Action(String),

    #[error("observation failed: {0}")]
    Observation(String),

    #[error("surface unavailable: {0}")]
    Unavailable(String),

    #[error("{0} timed out")]
    Timeout(String),
}

/// Driver for the controllable page/session
#[async_trait]
pub trait SurfaceDriver: Send + Sync {
    /// Perform one action
    async fn execute(&self, action: &Action) -> Result<(), SurfaceError>;

    /// Capture the current state of the surface
    async fn observe(&self) -> Result<Observation, SurfaceError>;
}
