//! Wayfind SDK
//!
//! Shared contract between the goal execution engine and the interactive
//! surface it drives. Surface driver implementations only need this crate.

/// Error types and handling
pub mod errors;

/// Actions and observations exchanged with the surface
pub mod types;

/// Surface driver contract
pub mod surface;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use surface::{SurfaceDriver, SurfaceError};
pub use types::{Action, ActionKind, Observation};
