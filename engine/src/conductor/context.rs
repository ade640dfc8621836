//! Engine Context
//!
//! Explicit handle to everything a goal run needs: the exclusive surface, the
//! collaborator clients, the strategy registry and the call limits. It is
//! built once at startup and passed by reference into every orchestrator call.

use sdk::{EngineError, SurfaceDriver};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use super::collaborators::{Planner, Summarizer};
use crate::strategy::StrategyRegistry;

/// Step budget for LLM-guided planners
pub const DEFAULT_MAX_STEPS: usize = 8;

/// Step budget for rule-based planners
pub const SIMPLE_MAX_STEPS: usize = 5;

/// Steps of history handed to the Planner
pub const DEFAULT_TRAILING_HISTORY: usize = 5;

pub const DEFAULT_OBSERVE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PLANNER_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SUMMARIZER_TIMEOUT_SECS: u64 = 60;

/// Timeouts and budgets applied at every call boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLimits {
    pub max_steps: usize,
    pub simple_max_steps: usize,
    pub trailing_history: usize,
    pub observe_timeout: Duration,
    pub action_timeout: Duration,
    pub planner_timeout: Duration,
    pub summarizer_timeout: Duration,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            simple_max_steps: SIMPLE_MAX_STEPS,
            trailing_history: DEFAULT_TRAILING_HISTORY,
            observe_timeout: Duration::from_secs(DEFAULT_OBSERVE_TIMEOUT_SECS),
            action_timeout: Duration::from_secs(DEFAULT_ACTION_TIMEOUT_SECS),
            planner_timeout: Duration::from_secs(DEFAULT_PLANNER_TIMEOUT_SECS),
            summarizer_timeout: Duration::from_secs(DEFAULT_SUMMARIZER_TIMEOUT_SECS),
        }
    }
}

/// Shared engine state; cheap to clone
#[derive(Clone)]
pub struct EngineContext {
    surface: Arc<dyn SurfaceDriver>,
    surface_lock: Arc<Mutex<()>>,
    planner: Arc<dyn Planner>,
    summarizer: Arc<dyn Summarizer>,
    registry: Arc<StrategyRegistry>,
    limits: EngineLimits,
}

impl EngineContext {
    pub fn new(
        surface: Arc<dyn SurfaceDriver>,
        planner: Arc<dyn Planner>,
        summarizer: Arc<dyn Summarizer>,
        registry: Arc<StrategyRegistry>,
    ) -> Self {
        Self {
            surface,
            surface_lock: Arc::new(Mutex::new(())),
            planner,
            summarizer,
            registry,
            limits: EngineLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn surface(&self) -> &dyn SurfaceDriver {
        self.surface.as_ref()
    }

    /// Exclusive claim on the surface. Held for a whole goal so two goals
    /// never interleave actions.
    pub async fn claim_surface(&self) -> MutexGuard<'_, ()> {
        self.surface_lock.lock().await
    }

    pub fn planner(&self) -> &dyn Planner {
        self.planner.as_ref()
    }

    pub fn summarizer(&self) -> &dyn Summarizer {
        self.summarizer.as_ref()
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Registry a goal runs with: narrowed to `strategies` when given
    pub fn registry_for(
        &self,
        strategies: Option<&[String]>,
    ) -> Result<Cow<'_, StrategyRegistry>, EngineError> {
        match strategies {
            Some(names) => Ok(Cow::Owned(self.registry.subset(names)?)),
            None => Ok(Cow::Borrowed(self.registry.as_ref())),
        }
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// Budget used when a goal does not set its own
    pub fn default_max_steps(&self) -> usize {
        if self.planner.is_llm_guided() {
            self.limits.max_steps
        } else {
            self.limits.simple_max_steps
        }
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("registry", &self.registry)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
