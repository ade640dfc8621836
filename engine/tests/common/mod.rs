//! Deterministic collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use sdk::{Action, ActionKind, EngineError, Observation, SurfaceDriver, SurfaceError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wayfind_engine::conductor::{
    EngineContext, Evaluation, ExecutionTrace, GoalMetrics, OutcomeJudge, Planner, StepResult,
    Summarizer, Summary,
};
use wayfind_engine::conductor::types::Source;
use wayfind_engine::strategy::StrategyRegistry;

pub fn page(url: &str, title: &str) -> Observation {
    Observation {
        url: url.to_string(),
        title: title.to_string(),
        ..Default::default()
    }
}

pub fn article(slug: &str, title: &str) -> Observation {
    page(
        &format!("https://en.wikipedia.org/wiki/{}", slug),
        &format!("{} - Wikipedia", title),
    )
}

/// In-memory surface. `openUrl` and `clickText` move to a scripted page when
/// one is registered, otherwise `openUrl` lands on a blank page at that URL.
#[derive(Default)]
pub struct ScriptedSurface {
    current: Mutex<Observation>,
    pages: HashMap<String, Observation>,
    failing: Vec<ActionKind>,
    executed: Mutex<Vec<Action>>,
    observe_calls: AtomicUsize,
}

impl ScriptedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(self, observation: Observation) -> Self {
        *self.current.lock().unwrap() = observation;
        self
    }

    pub fn on_open(mut self, url: &str, observation: Observation) -> Self {
        self.pages.insert(url.to_string(), observation);
        self
    }

    pub fn on_click(mut self, text: &str, observation: Observation) -> Self {
        self.pages.insert(format!("click:{}", text), observation);
        self
    }

    pub fn failing(mut self, kind: ActionKind) -> Self {
        self.failing.push(kind);
        self
    }

    pub fn executed(&self) -> Vec<Action> {
        self.executed.lock().unwrap().clone()
    }

    pub fn observe_calls(&self) -> usize {
        self.observe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SurfaceDriver for ScriptedSurface {
    async fn execute(&self, action: &Action) -> Result<(), SurfaceError> {
        self.executed.lock().unwrap().push(action.clone());
        if self.failing.contains(&action.kind) {
            return Err(SurfaceError::Action(format!("{} rejected", action.kind)));
        }

        let next = match action.kind {
            ActionKind::OpenUrl => {
                let url = action.arg("url").unwrap_or_default();
                Some(
                    self.pages
                        .get(url)
                        .cloned()
                        .unwrap_or_else(|| page(url, "")),
                )
            }
            ActionKind::ClickText => action
                .arg("text")
                .and_then(|text| self.pages.get(&format!("click:{}", text)).cloned()),
            _ => None,
        };
        if let Some(next) = next {
            *self.current.lock().unwrap() = next;
        }
        Ok(())
    }

    async fn observe(&self) -> Result<Observation, SurfaceError> {
        self.observe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.lock().unwrap().clone())
    }
}

type PlanFn = dyn Fn(&str, usize) -> Result<Action, EngineError> + Send + Sync;

/// Planner driven by a closure of `(goal, call number)`
pub struct ScriptedPlanner {
    plan: Box<PlanFn>,
    calls: AtomicUsize,
    llm_guided: bool,
}

impl ScriptedPlanner {
    pub fn new(plan: impl Fn(&str, usize) -> Result<Action, EngineError> + Send + Sync + 'static) -> Self {
        Self {
            plan: Box::new(plan),
            calls: AtomicUsize::new(0),
            llm_guided: true,
        }
    }

    /// Plays `actions` in order, then stops
    pub fn sequence(actions: Vec<Action>) -> Self {
        let queue = Mutex::new(VecDeque::from(actions));
        Self::new(move |_, _| {
            Ok(queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Action::stop("script finished")))
        })
    }

    pub fn always(action: Action) -> Self {
        Self::new(move |_, _| Ok(action.clone()))
    }

    pub fn rule_based(mut self) -> Self {
        self.llm_guided = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn next_action(
        &self,
        goal: &str,
        _observation: &Observation,
        _history: &[StepResult],
    ) -> Result<Action, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.plan)(goal, call)
    }

    fn is_llm_guided(&self) -> bool {
        self.llm_guided
    }
}

/// Answers with the page title and cites the page
pub struct TitleSummarizer;

#[async_trait]
impl Summarizer for TitleSummarizer {
    async fn summarize(&self, _goal: &str, observation: &Observation) -> Result<Summary, EngineError> {
        Ok(Summary {
            answer: format!("Read {}", observation.title),
            sources: vec![Source {
                url: observation.url.clone(),
                title: observation.title.clone(),
            }],
        })
    }
}

/// Hands out scores in order; `None` entries fail the call
pub struct QueuedJudge {
    scores: Mutex<VecDeque<Option<f64>>>,
}

impl QueuedJudge {
    pub fn new(scores: Vec<Option<f64>>) -> Self {
        Self {
            scores: Mutex::new(scores.into()),
        }
    }
}

#[async_trait]
impl OutcomeJudge for QueuedJudge {
    async fn evaluate(
        &self,
        _goal: &str,
        _trace: &ExecutionTrace,
        _metrics: &GoalMetrics,
    ) -> Result<Evaluation, EngineError> {
        match self.scores.lock().unwrap().pop_front().flatten() {
            Some(score) => Ok(Evaluation {
                overall_success: score >= 0.5,
                global_score: Some(score),
                issues: Vec::new(),
                strengths: Vec::new(),
                recommendations: Vec::new(),
            }),
            None => Err(EngineError::Judge("judge offline".to_string())),
        }
    }
}

pub fn context(surface: Arc<ScriptedSurface>, planner: Arc<ScriptedPlanner>) -> EngineContext {
    EngineContext::new(
        surface,
        planner,
        Arc::new(TitleSummarizer),
        Arc::new(StrategyRegistry::builtin()),
    )
}
