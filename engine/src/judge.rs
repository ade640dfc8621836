//! LLM Outcome Judge
//!
//! Scores a finished goal run from its trace. The model answers with
//! `{overall_success, global_score, issues, strengths, recommendations}`;
//! the score is clamped into `[0, 1]` and a missing or non-numeric score is
//! kept as "no score".

use async_trait::async_trait;
use sdk::EngineError;
use std::sync::Arc;

use crate::conductor::{Evaluation, ExecutionTrace, GoalMetrics, OutcomeJudge};
use crate::llm::{extract_json_object, LLMProvider, Message};
use crate::planner::truncate;

/// Steps of the trace shown to the judge (most recent)
const MAX_TRACE_STEPS: usize = 20;

const SYSTEM_PROMPT: &str = "You grade how well a browser agent accomplished a goal.\n\
    Reply with exactly one JSON object:\n\
    {\"overall_success\": bool, \"global_score\": number between 0 and 1,\n\
     \"issues\": [string], \"strengths\": [string], \"recommendations\": [string]}\n";

pub struct LlmJudge {
    llm: Arc<dyn LLMProvider>,
}

impl LlmJudge {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    fn build_prompt(goal: &str, trace: &ExecutionTrace, metrics: &GoalMetrics) -> String {
        let mut prompt = format!(
            "Goal: {}\nSteps: {} across {} sub-goal(s), {} planner call(s), {} ms\n\nTrace:\n",
            goal, metrics.steps, metrics.sub_goals, metrics.planner_calls, metrics.elapsed_ms
        );
        for step in trace.trailing(MAX_TRACE_STEPS) {
            let action = step
                .last_action
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "(observe)".to_string());
            prompt.push_str(&format!(
                "- [{}] {} -> {} | {} | {}\n",
                step.info.sub_goal_index.unwrap_or(1),
                action,
                step.error.as_deref().unwrap_or("ok"),
                step.observation.url,
                truncate(&step.observation.title, 120)
            ));
        }
        prompt
    }

    /// Turn model output into an evaluation
    pub fn parse_evaluation(content: &str) -> Result<Evaluation, EngineError> {
        let value = extract_json_object(content)
            .ok_or_else(|| EngineError::Judge("no JSON object in reply".to_string()))?;

        let strings = |key: &str| -> Vec<String> {
            value
                .get(key)
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let global_score = value
            .get("global_score")
            .and_then(|v| v.as_f64())
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0));

        Ok(Evaluation {
            overall_success: value
                .get("overall_success")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            global_score,
            issues: strings("issues"),
            strengths: strings("strengths"),
            recommendations: strings("recommendations"),
        })
    }
}

#[async_trait]
impl OutcomeJudge for LlmJudge {
    async fn evaluate(
        &self,
        goal: &str,
        trace: &ExecutionTrace,
        metrics: &GoalMetrics,
    ) -> Result<Evaluation, EngineError> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(Self::build_prompt(goal, trace, metrics)),
        ];

        let reply = self
            .llm
            .generate(&messages)
            .await
            .map_err(|e| EngineError::Judge(e.to_string()))?;

        Self::parse_evaluation(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_evaluation_clamps_score() {
        let evaluation = LlmJudge::parse_evaluation(
            r#"{"overall_success": true, "global_score": 1.4, "issues": ["slow"], "strengths": []}"#,
        )
        .unwrap();
        assert!(evaluation.overall_success);
        assert_eq!(evaluation.global_score, Some(1.0));
        assert_eq!(evaluation.issues, vec!["slow".to_string()]);
        assert!(evaluation.recommendations.is_empty());
    }

    #[test]
    fn test_parse_evaluation_without_score() {
        let evaluation =
            LlmJudge::parse_evaluation(r#"{"overall_success": false, "global_score": "n/a"}"#).unwrap();
        assert_eq!(evaluation.global_score, None);
    }

    #[test]
    fn test_parse_evaluation_rejects_prose() {
        assert!(matches!(
            LlmJudge::parse_evaluation("Looks good to me"),
            Err(EngineError::Judge(_))
        ));
    }
}
