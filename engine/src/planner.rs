//! LLM Planner
//!
//! Asks a chat model for the next surface action. The model sees the goal,
//! a trimmed view of the current observation and the trailing history, and
//! answers with one JSON object `{"action": "<kind>", "args": {...}}`.
//! Provider or parse failures come back as `EngineError::Planner`; the step
//! loop turns them into `stop`.

use async_trait::async_trait;
use sdk::{Action, ActionKind, EngineError, Observation};
use std::sync::Arc;
use tracing::debug;

use crate::conductor::{Planner, StepResult};
use crate::llm::{extract_json_object, LLMProvider, Message};

/// Characters of visible text included in the prompt
const MAX_VISIBLE_TEXT: usize = 2000;

/// Clickable labels and input hints included in the prompt
const MAX_LABELS: usize = 30;

const SYSTEM_PROMPT: &str = "You control a web browser to accomplish the user's goal.\n\
    Reply with exactly one JSON object and nothing else:\n\
    {\"action\": \"<kind>\", \"args\": {...}}\n\n\
    Kinds and their args:\n\
    - openUrl: {\"url\"}\n\
    - clickText: {\"text\"} visible text of a link or button\n\
    - fillInput: {\"hint\", \"value\"} hint is the field's label or placeholder\n\
    - pressKey: {\"key\"} e.g. Enter\n\
    - acceptCookies: {}\n\
    - wait: {\"ms\"}\n\
    - uploadFile: {\"hint\", \"path\"}\n\
    - stop: {\"reason\"} when the page already answers the goal\n";

/// Planner backed by an LLM provider
pub struct LlmPlanner {
    llm: Arc<dyn LLMProvider>,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    fn build_prompt(goal: &str, observation: &Observation, history: &[StepResult]) -> String {
        let mut prompt = format!("Goal: {}\n\nCurrent page:\n", goal);
        prompt.push_str(&render_observation(observation));

        if !history.is_empty() {
            prompt.push_str("\nRecent steps:\n");
            for (i, step) in history.iter().enumerate() {
                let action = step
                    .last_action
                    .as_ref()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "(observe)".to_string());
                let status = step.error.as_deref().unwrap_or("ok");
                prompt.push_str(&format!("{}. {} -> {} @ {}\n", i + 1, action, status, step.observation.url));
            }
        }

        prompt.push_str("\nWhat is the next action?");
        prompt
    }

    /// Turn model output into a validated action
    pub fn parse_action(content: &str) -> Result<Action, EngineError> {
        let value = extract_json_object(content).ok_or_else(|| {
            EngineError::Planner(format!("no JSON object in reply: {}", truncate(content, 200)))
        })?;

        let kind_name = value
            .get("action")
            .or_else(|| value.get("kind"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::Planner("reply has no 'action' field".to_string()))?;
        let kind: ActionKind = kind_name
            .parse()
            .map_err(|e: sdk::types::ActionError| EngineError::Planner(e.to_string()))?;

        let mut action = Action::new(kind);
        if let Some(args) = value.get("args").and_then(|v| v.as_object()) {
            for (key, arg) in args {
                let rendered = match arg {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => continue,
                    other => other.to_string(),
                };
                action = action.with_arg(key.clone(), rendered);
            }
        }

        action
            .validate()
            .map_err(|e| EngineError::Planner(e.to_string()))?;
        Ok(action)
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn next_action(
        &self,
        goal: &str,
        observation: &Observation,
        history: &[StepResult],
    ) -> Result<Action, EngineError> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(Self::build_prompt(goal, observation, history)),
        ];

        let reply = self
            .llm
            .generate(&messages)
            .await
            .map_err(|e| EngineError::Planner(e.to_string()))?;

        debug!("Planner reply from {}: {}", self.llm.name(), truncate(&reply, 300));
        Self::parse_action(&reply)
    }
}

pub(crate) fn render_observation(observation: &Observation) -> String {
    let mut out = format!("URL: {}\nTitle: {}\n", observation.url, observation.title);
    if !observation.visible_text.is_empty() {
        out.push_str(&format!(
            "Text: {}\n",
            truncate(&observation.visible_text, MAX_VISIBLE_TEXT)
        ));
    }
    if !observation.clickable_labels.is_empty() {
        let labels: Vec<&str> = observation
            .clickable_labels
            .iter()
            .take(MAX_LABELS)
            .map(String::as_str)
            .collect();
        out.push_str(&format!("Clickable: {}\n", labels.join(" | ")));
    }
    if !observation.input_hints.is_empty() {
        let hints: Vec<&str> = observation
            .input_hints
            .iter()
            .take(MAX_LABELS)
            .map(String::as_str)
            .collect();
        out.push_str(&format!("Inputs: {}\n", hints.join(" | ")));
    }
    out
}

/// Truncate on a char boundary
pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::StepInfo;

    #[test]
    fn test_parse_action_raw_and_fenced() {
        let action = LlmPlanner::parse_action(r#"{"action": "openUrl", "args": {"url": "https://a.test"}}"#).unwrap();
        assert_eq!(action, Action::open_url("https://a.test"));

        let fenced = "Sure!\n```json\n{\"action\": \"pressKey\", \"args\": {\"key\": \"Enter\"}}\n```";
        assert_eq!(LlmPlanner::parse_action(fenced).unwrap(), Action::press_key("Enter"));
    }

    #[test]
    fn test_parse_action_stringifies_numbers() {
        let action = LlmPlanner::parse_action(r#"{"action": "wait", "args": {"ms": 500}}"#).unwrap();
        assert_eq!(action, Action::wait(500));
    }

    #[test]
    fn test_parse_action_rejects_bad_replies() {
        assert!(matches!(
            LlmPlanner::parse_action("I would click the first link"),
            Err(EngineError::Planner(_))
        ));
        assert!(LlmPlanner::parse_action(r#"{"action": "teleport"}"#).is_err());
        assert!(LlmPlanner::parse_action(r#"{"action": "clickText", "args": {}}"#).is_err());
    }

    #[test]
    fn test_prompt_includes_history() {
        let observation = Observation {
            url: "https://en.wikipedia.org/wiki/Main_Page".to_string(),
            title: "Wikipedia".to_string(),
            ..Default::default()
        };
        let step = StepResult::new(
            observation.clone(),
            Some(Action::click_text("Search")),
            StepInfo::default(),
        )
        .with_error("element not found");

        let prompt = LlmPlanner::build_prompt("find Ada Lovelace", &observation, &[step]);
        assert!(prompt.contains("Goal: find Ada Lovelace"));
        assert!(prompt.contains("clickText(text=\"Search\") -> element not found"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
