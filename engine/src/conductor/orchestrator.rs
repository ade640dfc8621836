//! Sub-Goal Orchestrator
//!
//! Runs one goal end to end: decompose, run each sub-goal through the step
//! loop in order, carry the last named entity forward for pronoun
//! resolution, summarize each sub-goal's final observation and assemble the
//! answer sections and sources.

use sdk::{EngineError, Observation};
use std::collections::HashSet;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::collaborators::Summary;
use super::context::EngineContext;
use super::decomposer::{resolve_focus, GoalDecomposer};
use super::step_loop::StepLoop;
use super::types::{
    AnswerSection, ExecutionOverrides, ExecutionTrace, Goal, GoalMetrics, GoalOutcome, Source,
    StepPhase,
};

/// Sources kept in the compact, goal-level summary
pub const MAX_SUMMARY_SOURCES: usize = 3;

/// Drives all sub-goals of a goal over the shared surface
pub struct SubGoalOrchestrator<'a> {
    ctx: &'a EngineContext,
}

impl<'a> SubGoalOrchestrator<'a> {
    pub fn new(ctx: &'a EngineContext) -> Self {
        Self { ctx }
    }

    /// Run `goal` with the given per-goal settings.
    ///
    /// Only malformed input fails here (empty goal, unknown strategy name);
    /// surface and collaborator failures end up in the trace instead.
    pub async fn run_goal(
        &self,
        goal: &Goal,
        overrides: &ExecutionOverrides,
    ) -> Result<GoalOutcome, EngineError> {
        let started = Instant::now();
        let text = goal.text.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidGoal("goal text is empty".to_string()));
        }

        let registry = self.ctx.registry_for(overrides.strategies.as_deref())?;
        let max_steps = overrides
            .max_steps
            .unwrap_or_else(|| self.ctx.default_max_steps());
        let preresolved = overrides
            .focus_entity
            .clone()
            .or_else(|| goal.focus_entity.clone());

        let sub_goals = GoalDecomposer::new(&registry).decompose(text);
        info!(
            "Running goal '{}' as {} sub-goal(s), max_steps={}",
            text,
            sub_goals.len(),
            max_steps
        );

        let _surface = self.ctx.claim_surface().await;

        let mut trace = ExecutionTrace::new();
        let mut sections = Vec::with_capacity(sub_goals.len());
        let mut last_named = preresolved.clone();

        for (position, sub_goal) in sub_goals.iter().enumerate() {
            let reset_context = position == 0;
            let focus = resolve_focus(sub_goal, last_named.as_deref()).or_else(|| {
                if position == 0 {
                    preresolved.clone()
                } else {
                    None
                }
            });

            debug!(
                "Sub-goal {}: '{}' focus={:?} reset={}",
                sub_goal.index, sub_goal.text, focus, reset_context
            );

            let mut steps = StepLoop::new(self.ctx, &registry, &sub_goal.text, focus.as_deref())
                .run(reset_context, max_steps)
                .await;
            for step in steps.iter_mut() {
                step.info.sub_goal_index = Some(sub_goal.index);
            }

            let final_observation = steps
                .last()
                .map(|step| step.observation.clone())
                .unwrap_or_default();
            trace.extend(steps);

            if let Some(entity) = &sub_goal.focus_entity {
                last_named = Some(entity.clone());
            }

            let summary = self.summarize(&sub_goal.text, &final_observation).await;
            sections.push(AnswerSection {
                index: sub_goal.index,
                sub_goal: sub_goal.text.clone(),
                answer: summary.answer,
                sources: section_sources(&final_observation, summary.sources),
            });
        }

        let answer = assemble_answer(&sections);
        let sources = merge_sources(&sections, MAX_SUMMARY_SOURCES);
        let metrics = collect_metrics(&trace, sub_goals.len(), started);

        info!(
            "Goal '{}' finished: {} steps, {} planner calls, {:.1}s",
            text,
            metrics.steps,
            metrics.planner_calls,
            started.elapsed().as_secs_f64()
        );

        Ok(GoalOutcome {
            goal: text.to_string(),
            sub_goals,
            trace,
            answer,
            sources,
            sections,
            metrics,
        })
    }

    /// Summarize one observation; failures degrade to an empty answer.
    async fn summarize(&self, goal: &str, observation: &Observation) -> Summary {
        if observation.is_unknown() {
            return Summary::default();
        }

        let limit = self.ctx.limits().summarizer_timeout;
        match timeout(limit, self.ctx.summarizer().summarize(goal, observation)).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                warn!("Summarizer failed for '{}': {}", goal, e);
                Summary::default()
            }
            Err(_) => {
                warn!("Summarizer timed out for '{}' after {}s", goal, limit.as_secs());
                Summary::default()
            }
        }
    }
}

/// The final page plus whatever the summarizer cited, deduplicated by URL
fn section_sources(observation: &Observation, cited: Vec<Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    let page = (!observation.url.is_empty()).then(|| Source {
        url: observation.url.clone(),
        title: observation.title.clone(),
    });

    page.into_iter()
        .chain(cited)
        .filter(|source| !source.url.is_empty() && seen.insert(source.url.clone()))
        .collect()
}

/// Sources across all sections, most recent sub-goal first, capped at `cap`
fn merge_sources(sections: &[AnswerSection], cap: usize) -> Vec<Source> {
    let mut seen = HashSet::new();
    sections
        .iter()
        .rev()
        .flat_map(|section| section.sources.iter())
        .filter(|source| seen.insert(source.url.as_str()))
        .take(cap)
        .cloned()
        .collect()
}

/// One section reads as a plain answer; several become numbered sections.
fn assemble_answer(sections: &[AnswerSection]) -> String {
    match sections {
        [single] => single.answer.clone(),
        _ => sections
            .iter()
            .map(|section| format!("{}. {}", section.index, section.answer))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn collect_metrics(trace: &ExecutionTrace, sub_goals: usize, started: Instant) -> GoalMetrics {
    let steps = trace.steps();
    GoalMetrics {
        steps: steps.len(),
        sub_goals,
        planner_calls: steps
            .iter()
            .filter(|s| s.info.phase == StepPhase::Planner && s.last_action.is_some())
            .count(),
        reorientations: steps
            .iter()
            .filter(|s| s.info.phase == StepPhase::Reorientation)
            .count(),
        early_stops: steps
            .iter()
            .filter(|s| s.info.early_stop.map(|r| r.is_satisfied()).unwrap_or(false))
            .count(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(index: usize, answer: &str, urls: &[&str]) -> AnswerSection {
        AnswerSection {
            index,
            sub_goal: format!("sub-goal {}", index),
            answer: answer.to_string(),
            sources: urls
                .iter()
                .map(|url| Source {
                    url: url.to_string(),
                    title: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_section_answer_is_plain() {
        assert_eq!(assemble_answer(&[section(1, "Paris", &[])]), "Paris");
    }

    #[test]
    fn test_multiple_sections_are_numbered_in_order() {
        let answer = assemble_answer(&[section(1, "first", &[]), section(2, "second", &[])]);
        assert_eq!(answer, "1. first\n\n2. second");
    }

    #[test]
    fn test_merge_sources_most_recent_first_and_capped() {
        let sections = vec![
            section(1, "", &["https://a", "https://b"]),
            section(2, "", &["https://c", "https://a"]),
            section(3, "", &["https://d"]),
        ];
        let urls: Vec<String> = merge_sources(&sections, 3)
            .into_iter()
            .map(|s| s.url)
            .collect();
        assert_eq!(urls, vec!["https://d", "https://c", "https://a"]);

        let all = merge_sources(&sections, usize::MAX);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_section_sources_put_final_page_first() {
        let observation = Observation {
            url: "https://en.wikipedia.org/wiki/Ada_Lovelace".to_string(),
            title: "Ada Lovelace - Wikipedia".to_string(),
            ..Default::default()
        };
        let cited = vec![
            Source {
                url: "https://en.wikipedia.org/wiki/Ada_Lovelace".to_string(),
                title: String::new(),
            },
            Source {
                url: "https://example.org/notes".to_string(),
                title: "Notes".to_string(),
            },
        ];

        let sources = section_sources(&observation, cited);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "Ada Lovelace - Wikipedia");
        assert_eq!(sources[1].url, "https://example.org/notes");
    }

    #[test]
    fn test_section_sources_skip_unknown_page() {
        assert!(section_sources(&Observation::unknown(), Vec::new()).is_empty());
    }
}
