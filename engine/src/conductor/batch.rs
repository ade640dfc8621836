//! Batch Orchestrator
//!
//! Runs many independent goals one after another over the shared surface,
//! with a consecutive-failure circuit breaker. Once the breaker trips every
//! remaining item is reported as aborted; finished items keep their real
//! outcome. Errors and panics inside one goal become that item's failure
//! record and never escape the batch.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info, warn};

use super::context::EngineContext;
use super::feedback::{EntityRegression, OutcomeFeedbackBinder, OutcomeKeys};
use super::orchestrator::SubGoalOrchestrator;
use super::types::{
    BatchGoalResult, BatchItem, BatchRequest, BatchResult, BatchSummary, ExecutionOverrides, Goal,
    GoalOutcome,
};

/// Consecutive failures that abort the rest of a batch
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 5;

/// Per-field precedence: item override, then batch default, then engine
/// built-in (expressed as `None`).
pub fn layered_overrides(
    item: Option<&ExecutionOverrides>,
    defaults: &ExecutionOverrides,
) -> ExecutionOverrides {
    ExecutionOverrides {
        max_steps: item.and_then(|o| o.max_steps).or(defaults.max_steps),
        strategies: item
            .and_then(|o| o.strategies.clone())
            .or_else(|| defaults.strategies.clone()),
        focus_entity: item
            .and_then(|o| o.focus_entity.clone())
            .or_else(|| defaults.focus_entity.clone()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Sequential batch runner
pub struct BatchOrchestrator<'a> {
    ctx: &'a EngineContext,
    feedback: Option<&'a OutcomeFeedbackBinder>,
    default_max_consecutive_failures: usize,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(ctx: &'a EngineContext) -> Self {
        Self {
            ctx,
            feedback: None,
            default_max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// Record every completed goal in the outcome store
    pub fn with_feedback(mut self, binder: &'a OutcomeFeedbackBinder) -> Self {
        self.feedback = Some(binder);
        self
    }

    /// Threshold used when a request does not carry its own
    pub fn with_max_consecutive_failures(mut self, max: usize) -> Self {
        self.default_max_consecutive_failures = max;
        self
    }

    /// Run a batch request
    pub async fn run(&self, request: &BatchRequest) -> BatchResult {
        let max = request
            .max_consecutive_failures
            .unwrap_or(self.default_max_consecutive_failures);
        self.run_items(&request.goals, &request.defaults, max).await
    }

    /// Run `items` in submission order.
    ///
    /// The breaker is checked before each item: once `max_consecutive_failures`
    /// items in a row have failed, the rest are marked aborted.
    pub async fn run_items(
        &self,
        items: &[BatchItem],
        defaults: &ExecutionOverrides,
        max_consecutive_failures: usize,
    ) -> BatchResult {
        let started = Instant::now();
        let mut results = Vec::with_capacity(items.len());
        let mut consecutive_failures = 0usize;
        let mut aborted = false;

        info!(
            "Starting batch of {} goal(s), max consecutive failures {}",
            items.len(),
            max_consecutive_failures
        );

        for (position, item) in items.iter().enumerate() {
            if aborted || consecutive_failures >= max_consecutive_failures {
                if !aborted {
                    warn!(
                        "Aborting batch after {} consecutive failures; {} goal(s) skipped",
                        consecutive_failures,
                        items.len() - position
                    );
                    aborted = true;
                }
                results.push(BatchGoalResult {
                    id: item.id.clone(),
                    goal: item.text.clone(),
                    success: false,
                    error: Some(format!(
                        "aborted: {} consecutive failures before this goal ran",
                        consecutive_failures
                    )),
                    final_answer: None,
                    metrics: None,
                    regressions: Vec::new(),
                });
                continue;
            }

            let result = self.run_item(item, defaults).await;
            if result.success {
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
            }
            results.push(result);
        }

        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = total - succeeded;
        let summary = BatchSummary {
            total,
            succeeded,
            failed,
            failure_ratio: if total == 0 {
                0.0
            } else {
                failed as f64 / total as f64
            },
            aborted,
            max_consecutive_failures,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Batch finished: {}/{} succeeded, aborted={} in {:.1}s",
            succeeded,
            total,
            aborted,
            started.elapsed().as_secs_f64()
        );

        BatchResult { results, summary }
    }

    async fn run_item(&self, item: &BatchItem, defaults: &ExecutionOverrides) -> BatchGoalResult {
        let overrides = layered_overrides(item.overrides.as_ref(), defaults);
        let goal = Goal::new(item.text.clone());
        let orchestrator = SubGoalOrchestrator::new(self.ctx);

        let run = AssertUnwindSafe(orchestrator.run_goal(&goal, &overrides))
            .catch_unwind()
            .await;

        let mut result = BatchGoalResult {
            id: item.id.clone(),
            goal: item.text.clone(),
            success: false,
            error: None,
            final_answer: None,
            metrics: None,
            regressions: Vec::new(),
        };

        match run {
            Ok(Ok(outcome)) => {
                result.success = outcome.succeeded();
                result.error = outcome.trace.first_error().map(str::to_string);
                result.final_answer = Some(outcome.answer.clone());
                result.metrics = Some(outcome.metrics.clone());
                result.regressions = self.record_feedback(&outcome, &overrides).await;
            }
            Ok(Err(e)) => {
                result.error = Some(e.to_string());
            }
            Err(payload) => {
                result.error = Some(format!("panicked: {}", panic_message(payload.as_ref())));
            }
        }

        if let Some(e) = &result.error {
            error!("Goal '{}' failed: {}", item.id, e);
        }
        result
    }

    async fn record_feedback(
        &self,
        outcome: &GoalOutcome,
        overrides: &ExecutionOverrides,
    ) -> Vec<EntityRegression> {
        let Some(binder) = self.feedback else {
            return Vec::new();
        };

        // The goal already ran with this subset, so the names are known good
        let registry = match self.ctx.registry_for(overrides.strategies.as_deref()) {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Failed to narrow strategies for '{}': {}", outcome.goal, e);
                return Vec::new();
            }
        };
        let keys = OutcomeKeys::for_outcome(outcome, &registry);
        match binder.bind(outcome, &keys).await {
            Ok(report) => report.regressions,
            Err(e) => {
                warn!("Failed to record outcome for '{}': {:#}", outcome.goal, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_overrides_precedence() {
        let defaults = ExecutionOverrides {
            max_steps: Some(4),
            strategies: Some(vec!["encyclopedia".to_string()]),
            focus_entity: None,
        };
        let item = ExecutionOverrides {
            max_steps: Some(2),
            strategies: None,
            focus_entity: Some("Ada Lovelace".to_string()),
        };

        let merged = layered_overrides(Some(&item), &defaults);
        assert_eq!(merged.max_steps, Some(2));
        assert_eq!(merged.strategies, Some(vec!["encyclopedia".to_string()]));
        assert_eq!(merged.focus_entity.as_deref(), Some("Ada Lovelace"));

        let fallback = layered_overrides(None, &ExecutionOverrides::default());
        assert_eq!(fallback, ExecutionOverrides::default());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
