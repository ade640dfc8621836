//! LLM Summarizer
//!
//! Answers a sub-goal from the page it ended on. The page itself is always
//! the first source.

use async_trait::async_trait;
use sdk::{EngineError, Observation};
use std::sync::Arc;

use crate::conductor::types::Source;
use crate::conductor::{Summarizer, Summary};
use crate::llm::{LLMProvider, Message};
use crate::planner::render_observation;

const SYSTEM_PROMPT: &str = "Answer the user's goal using only the page content provided. \
    Be concise. If the page does not contain the answer, say so in one sentence.";

pub struct LlmSummarizer {
    llm: Arc<dyn LLMProvider>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, goal: &str, observation: &Observation) -> Result<Summary, EngineError> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(format!(
                "Goal: {}\n\nPage:\n{}",
                goal,
                render_observation(observation)
            )),
        ];

        let answer = self
            .llm
            .generate(&messages)
            .await
            .map_err(|e| EngineError::Summarizer(e.to_string()))?;

        let sources = if observation.url.is_empty() {
            Vec::new()
        } else {
            vec![Source {
                url: observation.url.clone(),
                title: observation.title.clone(),
            }]
        };

        Ok(Summary {
            answer: answer.trim().to_string(),
            sources,
        })
    }
}
