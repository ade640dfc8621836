//! Context Strategies
//!
//! A context strategy recognizes a goal domain, steers the surface into that
//! domain, and judges whether the goal is already satisfied there. Strategies
//! are pure: they look at the goal text and an observation and never touch the
//! surface themselves. Any uncertainty degrades to "does not apply",
//! "nothing to do" or "not satisfied".

pub mod encyclopedia;
pub mod image_search;
pub mod registry;
pub mod video_search;

pub use encyclopedia::EncyclopediaStrategy;
pub use image_search::ImageSearchStrategy;
pub use registry::{Reorientation, StrategyRegistry};
pub use video_search::VideoSearchStrategy;

use regex::Regex;
use sdk::{Action, Observation};
use std::sync::OnceLock;

/// Capability set every context strategy implements
pub trait ContextStrategy: Send + Sync {
    /// Stable name used in configuration and provenance
    fn name(&self) -> &'static str;

    /// Whether `goal` belongs to this strategy's domain
    fn goal_applies(&self, goal: &str, focus_entity: Option<&str>) -> bool;

    /// Action that moves the surface into this domain.
    ///
    /// Must return `None` when the goal does not apply or the observation is
    /// already in the right context, so reorientation is idempotent.
    fn ensure_context(
        &self,
        goal: &str,
        observation: &Observation,
        focus_entity: Option<&str>,
    ) -> Option<Action>;

    /// Whether the observation already answers the goal
    fn is_satisfied(&self, goal: &str, observation: &Observation, focus_entity: Option<&str>)
        -> bool;
}

static FILLER_PATTERN: OnceLock<Regex> = OnceLock::new();
static DOMAIN_QUALIFIER_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Leading request phrasing that carries no search meaning.
fn filler_pattern() -> &'static Regex {
    FILLER_PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:please\s+)?(?:find|search(?:\s+for)?|look\s+up|show(?:\s+me)?|get|open|tell\s+me\s+about|what\s+(?:is|are|was|were)|who\s+(?:is|was)|watch|play)(?:\s+|$)",
        )
        .expect("Invalid filler pattern")
    })
}

/// Trailing "in Wikipedia" style qualifiers naming a domain.
pub(crate) fn domain_qualifier_pattern() -> &'static Regex {
    DOMAIN_QUALIFIER_PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:in|on|from|using|via)\s+(?:the\s+)?(wikipedia|the\s+encyclopedia|encyclopedia|youtube|google\s+images|image\s+search|bing\s+images)\b",
        )
        .expect("Invalid domain qualifier pattern")
    })
}

/// Search query for a goal: the focus entity when known, otherwise the goal
/// text with request phrasing, domain qualifiers and `strip` removed.
pub(crate) fn subject_query(goal: &str, focus_entity: Option<&str>, strip: &Regex) -> Option<String> {
    if let Some(entity) = focus_entity.map(str::trim).filter(|e| !e.is_empty()) {
        return Some(entity.to_string());
    }

    let without_qualifier = domain_qualifier_pattern().replace_all(goal, " ");
    let without_domain = strip.replace_all(&without_qualifier, " ");
    let without_filler = filler_pattern().replace(without_domain.trim(), "");
    let query = without_filler
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string();

    if query.is_empty() {
        None
    } else {
        Some(query)
    }
}

/// True when every significant word of `query` shows up in the observation's
/// URL, title or visible text.
pub(crate) fn terms_present(observation: &Observation, query: &str) -> bool {
    let haystack = format!(
        "{} {} {}",
        observation.url.replace(['+', '_'], " ").replace("%20", " "),
        observation.title,
        observation.visible_text
    )
    .to_lowercase();

    let mut significant = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .peekable();

    if significant.peek().is_none() {
        return false;
    }
    significant.all(|word| haystack.contains(&word))
}

/// Build a URL with an encoded query string, or `None` if the base is invalid.
pub(crate) fn search_url(base: &str, params: &[(&str, &str)]) -> Option<String> {
    reqwest::Url::parse_with_params(base, params)
        .ok()
        .map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_strip() -> Regex {
        Regex::new(r"^\b$").unwrap()
    }

    #[test]
    fn test_subject_query_prefers_focus_entity() {
        let query = subject_query("find his birthplace", Some("Ada Lovelace"), &no_strip());
        assert_eq!(query.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_subject_query_strips_filler_and_qualifier() {
        let query = subject_query("Look up Alan Turing in Wikipedia.", None, &no_strip());
        assert_eq!(query.as_deref(), Some("Alan Turing"));
    }

    #[test]
    fn test_subject_query_empty_goal() {
        assert_eq!(subject_query("  find  ", None, &no_strip()), None);
    }

    #[test]
    fn test_terms_present() {
        let obs = Observation {
            url: "https://en.wikipedia.org/wiki/Alan_Turing".to_string(),
            title: "Alan Turing - Wikipedia".to_string(),
            ..Default::default()
        };
        assert!(terms_present(&obs, "Alan Turing"));
        assert!(!terms_present(&obs, "Grace Hopper"));
        assert!(!terms_present(&obs, "of"));
    }

    #[test]
    fn test_search_url_encodes_query() {
        let url = search_url("https://www.youtube.com/results", &[("search_query", "a b&c")]).unwrap();
        assert_eq!(url, "https://www.youtube.com/results?search_query=a+b%26c");
    }
}
