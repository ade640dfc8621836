//! External collaborators
//!
//! The engine depends on three pluggable services: a Planner that proposes the
//! next action, an Outcome Judge that scores a finished trace, and a
//! Summarizer that turns a final observation into an answer. All three are
//! trait objects injected through `EngineContext`, so tests swap in
//! deterministic mocks and the CLI wires LLM-backed ones.

use async_trait::async_trait;
use sdk::{Action, EngineError, Observation};
use serde::{Deserialize, Serialize};

use super::types::{ExecutionTrace, GoalMetrics, Source, StepResult};

/// Proposes the next surface action for a goal
#[async_trait]
pub trait Planner: Send + Sync {
    /// `history` holds the most recent steps of the current sub-goal, oldest
    /// first. Returning [`Action::stop`] ends the loop unless a domain
    /// obligation remains.
    async fn next_action(
        &self,
        goal: &str,
        observation: &Observation,
        history: &[StepResult],
    ) -> Result<Action, EngineError>;

    /// LLM-guided planners get the larger default step budget; rule-based
    /// planners the smaller one.
    fn is_llm_guided(&self) -> bool {
        true
    }
}

/// Judge verdict for one finished goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub overall_success: bool,
    /// Overall quality in `[0, 1]`; `None` when the judge gave no score
    #[serde(default)]
    pub global_score: Option<f64>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Evaluation {
    /// Verdict used when the judge is unavailable: no score, no issues.
    pub fn neutral() -> Self {
        Self {
            overall_success: false,
            global_score: None,
            issues: Vec::new(),
            strengths: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Scores a completed trace
#[async_trait]
pub trait OutcomeJudge: Send + Sync {
    async fn evaluate(
        &self,
        goal: &str,
        trace: &ExecutionTrace,
        metrics: &GoalMetrics,
    ) -> Result<Evaluation, EngineError>;
}

/// Answer extracted from one observation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Turns the final observation of a sub-goal into an answer
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, goal: &str, observation: &Observation)
        -> Result<Summary, EngineError>;
}
