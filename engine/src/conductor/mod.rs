//! Conductor System
//!
//! Goal execution: decomposition, the per-sub-goal step loop, goal and batch
//! orchestration, and the feedback pass into the outcome store.

pub mod batch;
pub mod collaborators;
pub mod context;
pub mod decomposer;
pub mod feedback;
pub mod orchestrator;
pub mod step_loop;
pub mod types;

pub use batch::{BatchOrchestrator, DEFAULT_MAX_CONSECUTIVE_FAILURES};
pub use collaborators::{Evaluation, OutcomeJudge, Planner, Summarizer, Summary};
pub use context::{EngineContext, EngineLimits, DEFAULT_MAX_STEPS, SIMPLE_MAX_STEPS};
pub use decomposer::GoalDecomposer;
pub use feedback::{EntityRegression, FeedbackReport, OutcomeFeedbackBinder, OutcomeKeys};
pub use orchestrator::SubGoalOrchestrator;
pub use step_loop::StepLoop;
pub use types::{
    BatchGoalResult, BatchItem, BatchRequest, BatchResult, BatchSummary, EarlyStopReason,
    ExecutionOverrides, ExecutionTrace, Goal, GoalMetrics, GoalOutcome, LoopExit, StepInfo,
    StepPhase, StepResult, SubGoal,
};
