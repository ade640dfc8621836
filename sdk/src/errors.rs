//! Error types and handling
//!
//! This module provides the error types used throughout the Wayfind engine.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! Messages are safe to surface at the batch boundary: they carry the goal
//! level cause, never provider credentials.

use thiserror::Error;

/// Trait for Wayfind error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors affect one goal and the batch may continue. Non-recoverable
    /// errors typically require a configuration change before anything can run.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Database**: SQLite operation failures on the outcome store
/// - **Surface**: the interactive surface rejected or failed an action
/// - **Collaborators**: Planner, Outcome Judge and Summarizer failures
/// - **Goal**: malformed goals submitted to the engine
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::Surface("element not found".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("bad provider".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Surface errors
    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),

    // Collaborator errors
    #[error("Planner error: {0}")]
    Planner(String),

    #[error("Outcome judge error: {0}")]
    Judge(String),

    #[error("Summarizer error: {0}")]
    Summarizer(String),

    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    // Goal errors
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Database(_) => "Outcome store operation failed. Check the data directory",
            Self::Surface(_) => "The page rejected the action. The goal may need rephrasing",
            Self::SurfaceUnavailable(_) => "Surface driver unreachable. Check the surface base_url",
            Self::Planner(_) => "Planner unavailable. Check your LLM provider settings",
            Self::Judge(_) => "Outcome judge unavailable. Scores were not recorded",
            Self::Summarizer(_) => "Summarizer unavailable. Answers may be empty",
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API keys and network",
            Self::Timeout { .. } => "The call took too long. Try again or raise the timeout",
            Self::InvalidGoal(_) => "Goal text is empty or malformed",
            Self::UnknownStrategy(_) => "Strategy name not recognised. Run 'wayfind config show'",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::Config(_) | Self::UnknownStrategy(_) | Self::SurfaceUnavailable(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = EngineError::Timeout {
            operation: "observe".to_string(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "observe timed out after 30s");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_config_errors_are_fatal() {
        assert!(!EngineError::Config("x".to_string()).is_recoverable());
        assert!(!EngineError::UnknownStrategy("maps".to_string()).is_recoverable());
        assert!(EngineError::Surface("x".to_string()).is_recoverable());
    }
}
