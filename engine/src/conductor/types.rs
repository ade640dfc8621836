//! Conductor data model
//!
//! Goals, sub-goals, the append-only execution trace and the batch
//! request/result shapes. Step provenance is a typed struct rather than a
//! free-form map; new concerns get their own named optional field.

use sdk::{Action, Observation};
use serde::{Deserialize, Serialize};

use super::feedback::EntityRegression;

/// A raw goal plus an optional pre-resolved focus entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub text: String,
    #[serde(default)]
    pub focus_entity: Option<String>,
}

impl Goal {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            focus_entity: None,
        }
    }

    pub fn with_focus(mut self, entity: impl Into<String>) -> Self {
        self.focus_entity = Some(entity.into());
        self
    }
}

/// One ordered fragment of a decomposed goal. Indices start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubGoal {
    pub index: usize,
    pub text: String,
    /// Entity named explicitly in this fragment, if any
    pub focus_entity: Option<String>,
}

/// Why a step loop stopped before exhausting its budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyStopReason {
    SatisfiedOnEntry,
    SatisfiedAfterReorientation,
    SatisfiedAfterAction,
    None,
}

impl EarlyStopReason {
    pub fn is_satisfied(&self) -> bool {
        !matches!(self, EarlyStopReason::None)
    }
}

/// How a step loop run ended; attached to its last step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExit {
    /// A strategy reported the goal satisfied
    Satisfied,
    /// The Planner returned `stop` and no domain obligation remained
    PlannerStop,
    /// `max_steps` iterations ran without satisfaction
    BudgetExhausted,
    /// A surface call failed or timed out
    Error,
}

/// Which part of the loop produced a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    #[default]
    Entry,
    Reorientation,
    Planner,
}

/// Reorientation metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorientationInfo {
    pub strategy: String,
    /// Forced because the Planner tried to stop while the domain was unmet
    pub forced: bool,
}

/// Typed provenance for one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_goal_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_entity: Option<String>,
    pub phase: StepPhase,
    /// Planner iteration (0-based) for planner-phase steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorientation: Option<ReorientationInfo>,
    #[serde(default)]
    pub stop_suppressed: bool,
    /// Set when the Planner failed and `stop` was substituted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_degraded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_stop: Option<EarlyStopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<LoopExit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

/// Record of one loop iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Observation,
    pub last_action: Option<Action>,
    pub error: Option<String>,
    pub info: StepInfo,
}

impl StepResult {
    pub fn new(observation: Observation, last_action: Option<Action>, info: StepInfo) -> Self {
        Self {
            observation,
            last_action,
            error: None,
            info,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Append-only, ordered list of steps for one goal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionTrace {
    steps: Vec<StepResult>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: StepResult) {
        self.steps.push(step);
    }

    pub fn extend(&mut self, steps: impl IntoIterator<Item = StepResult>) {
        self.steps.extend(steps);
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn last(&self) -> Option<&StepResult> {
        self.steps.last()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The most recent `n` steps, oldest first
    pub fn trailing(&self, n: usize) -> &[StepResult] {
        let start = self.steps.len().saturating_sub(n);
        &self.steps[start..]
    }

    /// Steps belonging to one sub-goal, in order
    pub fn for_sub_goal(&self, index: usize) -> impl Iterator<Item = &StepResult> {
        self.steps
            .iter()
            .filter(move |step| step.info.sub_goal_index == Some(index))
    }

    /// First error recorded anywhere in the trace
    pub fn first_error(&self) -> Option<&str> {
        self.steps.iter().find_map(|step| step.error.as_deref())
    }

    pub fn into_steps(self) -> Vec<StepResult> {
        self.steps
    }
}

/// A page the answer was drawn from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Per-sub-goal answer section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSection {
    pub index: usize,
    pub sub_goal: String,
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Counters describing one goal run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalMetrics {
    pub steps: usize,
    pub sub_goals: usize,
    pub planner_calls: usize,
    pub reorientations: usize,
    pub early_stops: usize,
    pub elapsed_ms: u64,
}

/// Everything produced by running one goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalOutcome {
    pub goal: String,
    pub sub_goals: Vec<SubGoal>,
    pub trace: ExecutionTrace,
    /// Numbered sections concatenated in sub-goal order
    pub answer: String,
    /// Deduplicated sources, most recent first, capped for compact summaries
    pub sources: Vec<Source>,
    /// Full structured per-sub-goal answers
    pub sections: Vec<AnswerSection>,
    pub metrics: GoalMetrics,
}

impl GoalOutcome {
    /// A goal succeeded when no step recorded an error
    pub fn succeeded(&self) -> bool {
        self.trace.first_error().is_none()
    }
}

/// Per-goal execution settings; every field is optional so layers can be merged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    /// Enabled strategy names; `None` keeps the engine registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_entity: Option<String>,
}

/// One goal submitted in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub overrides: Option<ExecutionOverrides>,
}

impl BatchItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            overrides: None,
        }
    }
}

/// Batch submission shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub goals: Vec<BatchItem>,
    #[serde(default)]
    pub defaults: ExecutionOverrides,
    #[serde(default)]
    pub max_consecutive_failures: Option<usize>,
}

/// Outcome of one batch item; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGoalResult {
    pub id: String,
    pub goal: String,
    pub success: bool,
    pub error: Option<String>,
    pub final_answer: Option<String>,
    pub metrics: Option<GoalMetrics>,
    /// Score regressions detected for this run; never persisted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regressions: Vec<EntityRegression>,
}

/// Aggregate numbers for a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failure_ratio: f64,
    pub aborted: bool,
    pub max_consecutive_failures: usize,
    pub elapsed_ms: u64,
}

/// Batch response shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<BatchGoalResult>,
    pub summary: BatchSummary,
}
