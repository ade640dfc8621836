//! Wayfind Engine Library
//!
//! Goal execution over an interactive surface: decomposition, context
//! strategies, the supervised step loop, batch orchestration and per-entity
//! outcome statistics. Used by the `wayfind` binary and integration tests.

/// Configuration management module
pub mod config;

/// Goal decomposition, step loop and orchestration
pub mod conductor;

/// Domain context strategies
pub mod strategy;

/// Per-entity outcome statistics
pub mod outcomes;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// LLM-backed planner
pub mod planner;

/// LLM-backed outcome judge
pub mod judge;

/// LLM-backed summarizer
pub mod summarizer;

/// Surface drivers
pub mod surface;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
