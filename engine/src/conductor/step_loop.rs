//! Step Execution Loop
//!
//! Per-sub-goal control loop: observe, reorient into the goal's domain when a
//! strategy asks for it, stop early once the goal is observably satisfied,
//! otherwise consult the Planner and execute its action, up to a step budget.
//!
//! Every surface and Planner call is bounded by a timeout. Surface failures
//! end the loop with the error recorded on the last step; Planner failures
//! degrade to `stop`. Nothing here is retried.

use sdk::{Action, EngineError, Observation, SurfaceError};
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::context::EngineContext;
use super::types::{
    EarlyStopReason, LoopExit, ReorientationInfo, StepInfo, StepPhase, StepResult,
};
use crate::strategy::{Reorientation, StrategyRegistry};

/// Result of one reorientation attempt
enum Reoriented {
    /// The goal is satisfied in the new context
    Satisfied,
    /// Fresh observation after moving into the domain
    Continue(Observation),
    /// The surface failed; the error is already recorded
    Failed,
}

/// One run of the loop for a single goal or sub-goal
pub struct StepLoop<'a> {
    ctx: &'a EngineContext,
    registry: &'a StrategyRegistry,
    goal: &'a str,
    focus_entity: Option<&'a str>,
    steps: Vec<StepResult>,
    reoriented: bool,
}

impl<'a> StepLoop<'a> {
    pub fn new(
        ctx: &'a EngineContext,
        registry: &'a StrategyRegistry,
        goal: &'a str,
        focus_entity: Option<&'a str>,
    ) -> Self {
        Self {
            ctx,
            registry,
            goal,
            focus_entity,
            steps: Vec::new(),
            reoriented: false,
        }
    }

    /// Run the loop and return its ordered steps.
    ///
    /// The last step always carries exactly one [`EarlyStopReason`] and the
    /// [`LoopExit`] explaining why the run ended. A `max_steps` of zero is
    /// treated as one.
    pub async fn run(mut self, reset_context: bool, max_steps: usize) -> Vec<StepResult> {
        let started = Instant::now();
        let max_steps = max_steps.max(1);

        debug!(
            "Step loop start: goal='{}' focus={:?} reset={} max_steps={}",
            self.goal, self.focus_entity, reset_context, max_steps
        );

        let exit = self.drive(reset_context, max_steps).await;

        if let Some(last) = self.steps.last_mut() {
            if last.info.early_stop.is_none() {
                last.info.early_stop = Some(EarlyStopReason::None);
            }
            last.info.exit = Some(exit);
            last.info.elapsed_ms = Some(started.elapsed().as_millis() as u64);
        }

        info!(
            "Step loop finished: goal='{}' exit={:?} steps={} in {:.1}s",
            self.goal,
            exit,
            self.steps.len(),
            started.elapsed().as_secs_f64()
        );

        self.steps
    }

    async fn drive(&mut self, reset_context: bool, max_steps: usize) -> LoopExit {
        // Entry: a reset discards whatever the surface currently shows.
        let mut observation = if reset_context {
            Observation::unknown()
        } else {
            match self.observe().await {
                Ok(observation) => observation,
                Err(e) => {
                    self.push_error(Observation::unknown(), None, StepPhase::Entry, None, e);
                    return LoopExit::Error;
                }
            }
        };

        if !reset_context && self.satisfied(&observation) {
            let mut info = self.info(StepPhase::Entry);
            info.early_stop = Some(EarlyStopReason::SatisfiedOnEntry);
            self.steps.push(StepResult::new(observation, None, info));
            return LoopExit::Satisfied;
        }

        if let Some(reorientation) = self.registry.resolve(self.goal, &observation, self.focus_entity) {
            match self.reorient(reorientation, observation, false, None).await {
                Reoriented::Continue(next) => observation = next,
                Reoriented::Satisfied => return LoopExit::Satisfied,
                Reoriented::Failed => return LoopExit::Error,
            }
        }

        let mut force_reorient = false;

        for iteration in 0..max_steps {
            debug!("Step loop iteration {}/{}", iteration + 1, max_steps);

            observation = match self.observe().await {
                Ok(observation) => observation,
                Err(e) => {
                    self.push_error(observation, None, StepPhase::Planner, Some(iteration), e);
                    return LoopExit::Error;
                }
            };

            if (iteration == 0 && !self.reoriented) || force_reorient {
                if let Some(reorientation) =
                    self.registry.resolve(self.goal, &observation, self.focus_entity)
                {
                    match self
                        .reorient(reorientation, observation, force_reorient, Some(iteration))
                        .await
                    {
                        Reoriented::Continue(next) => observation = next,
                        Reoriented::Satisfied => return LoopExit::Satisfied,
                        Reoriented::Failed => return LoopExit::Error,
                    }
                }
                force_reorient = false;
            }

            let (action, degraded) = self.consult_planner(&observation).await;

            let mut info = self.info(StepPhase::Planner);
            info.iteration = Some(iteration);
            info.planner_degraded = degraded;

            if action.is_stop() {
                if let Some(strategy) = self.registry.applicable(self.goal, self.focus_entity) {
                    if !strategy.is_satisfied(self.goal, &observation, self.focus_entity) {
                        debug!(
                            "Ignoring planner stop: {} domain not yet satisfied",
                            strategy.name()
                        );
                        info.stop_suppressed = true;
                        self.steps
                            .push(StepResult::new(observation.clone(), Some(action), info));
                        force_reorient = true;
                        continue;
                    }
                }
                self.steps.push(StepResult::new(observation, Some(action), info));
                return LoopExit::PlannerStop;
            }

            if let Err(e) = self.execute(&action).await {
                self.steps
                    .push(StepResult::new(observation, Some(action), info).with_error(e.to_string()));
                return LoopExit::Error;
            }

            observation = match self.observe().await {
                Ok(observation) => observation,
                Err(e) => {
                    self.steps.push(
                        StepResult::new(observation, Some(action), info).with_error(e.to_string()),
                    );
                    return LoopExit::Error;
                }
            };

            let satisfied = self.satisfied(&observation);
            if satisfied {
                info.early_stop = Some(EarlyStopReason::SatisfiedAfterAction);
            }
            self.steps.push(StepResult::new(observation.clone(), Some(action), info));
            if satisfied {
                return LoopExit::Satisfied;
            }
        }

        LoopExit::BudgetExhausted
    }

    /// Execute a strategy's action and re-observe
    async fn reorient(
        &mut self,
        reorientation: Reorientation,
        observation: Observation,
        forced: bool,
        iteration: Option<usize>,
    ) -> Reoriented {
        self.reoriented = true;

        let mut info = self.info(StepPhase::Reorientation);
        info.iteration = iteration;
        info.reorientation = Some(ReorientationInfo {
            strategy: reorientation.strategy.to_string(),
            forced,
        });

        if let Err(e) = self.execute(&reorientation.action).await {
            self.steps.push(
                StepResult::new(observation, Some(reorientation.action), info)
                    .with_error(e.to_string()),
            );
            return Reoriented::Failed;
        }

        let fresh = match self.observe().await {
            Ok(fresh) => fresh,
            Err(e) => {
                self.steps.push(
                    StepResult::new(observation, Some(reorientation.action), info)
                        .with_error(e.to_string()),
                );
                return Reoriented::Failed;
            }
        };

        let satisfied = self.satisfied(&fresh);
        if satisfied {
            info.early_stop = Some(EarlyStopReason::SatisfiedAfterReorientation);
        }
        self.steps
            .push(StepResult::new(fresh.clone(), Some(reorientation.action), info));

        if satisfied {
            Reoriented::Satisfied
        } else {
            Reoriented::Continue(fresh)
        }
    }

    fn satisfied(&self, observation: &Observation) -> bool {
        self.registry
            .is_any_satisfied(self.goal, observation, self.focus_entity)
    }

    fn info(&self, phase: StepPhase) -> StepInfo {
        StepInfo {
            focus_entity: self.focus_entity.map(str::to_string),
            phase,
            ..Default::default()
        }
    }

    fn push_error(
        &mut self,
        observation: Observation,
        action: Option<Action>,
        phase: StepPhase,
        iteration: Option<usize>,
        error: SurfaceError,
    ) {
        let mut info = self.info(phase);
        info.iteration = iteration;
        self.steps
            .push(StepResult::new(observation, action, info).with_error(error.to_string()));
    }

    async fn observe(&self) -> Result<Observation, SurfaceError> {
        match timeout(self.ctx.limits().observe_timeout, self.ctx.surface().observe()).await {
            Ok(result) => result,
            Err(_) => Err(SurfaceError::Timeout("observe".to_string())),
        }
    }

    async fn execute(&self, action: &Action) -> Result<(), SurfaceError> {
        debug!("Executing {}", action);
        let result = match timeout(self.ctx.limits().action_timeout, self.ctx.surface().execute(action)).await {
            Ok(result) => result,
            Err(_) => Err(SurfaceError::Timeout(action.kind.to_string())),
        };
        if let Err(e) = &result {
            warn!("Action {} failed: {}", action, e);
        }
        result
    }

    /// Ask the Planner for the next action; any failure becomes `stop`.
    async fn consult_planner(&self, observation: &Observation) -> (Action, Option<String>) {
        let limits = self.ctx.limits();
        let start = self.steps.len().saturating_sub(limits.trailing_history);
        let history = &self.steps[start..];

        let result = match timeout(
            limits.planner_timeout,
            self.ctx.planner().next_action(self.goal, observation, history),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                operation: "planner".to_string(),
                secs: limits.planner_timeout.as_secs(),
            }),
        };

        match result {
            Ok(action) => {
                debug!("Planner chose {}", action);
                (action, None)
            }
            Err(e) => {
                warn!("Planner failed, stopping: {}", e);
                (Action::stop("planner unavailable"), Some(e.to_string()))
            }
        }
    }
}
