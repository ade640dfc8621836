//! LLM Provider Abstraction Layer
//!
//! Common interface over the chat-completion backends (Ollama, OpenAI
//! compatible). The LLM-backed Planner, Outcome Judge and Summarizer talk to
//! a provider through [`LLMProvider`] and pull a JSON object out of whatever
//! text comes back.

use async_trait::async_trait;
use sdk::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod ollama;
pub mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Timeout => EngineError::Timeout {
                operation: "LLM request".to_string(),
                secs: 0,
            },
            other => EngineError::LLMProvider(other.to_string()),
        }
    }
}

/// Message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name for logs ("ollama", "openai")
    fn name(&self) -> &str;

    /// Model the provider sends requests to
    fn model(&self) -> &str;

    /// Generate the assistant's reply text for `messages`
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}

/// Pull the first JSON object out of model output.
///
/// Handles, in order:
/// 1. Raw JSON: the whole reply is an object
/// 2. Fenced JSON (with or without trailing text): ` ```json\n{...}\n``` `
/// 3. An object embedded in prose, found by brace matching
pub fn extract_json_object(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();

    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(value) = parse_object(inner.trim()) {
            return Some(value);
        }
    }

    let mut offset = 0;
    while let Some(pos) = trimmed[offset..].find('{') {
        let start = offset + pos;
        if let Some(candidate) = extract_balanced_json(&trimmed[start..]) {
            if let Some(value) = parse_object(candidate) {
                return Some(value);
            }
        }
        offset = start + 1;
    }

    None
}

fn parse_object(s: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(s)
        .ok()
        .filter(|value| value.is_object())
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start = fence_start + 3 + after_opening.find('\n')? + 1;
    let body_end = body_start + content[body_start..].find("```")?;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
