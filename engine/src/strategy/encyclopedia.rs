//! Encyclopedia strategy
//!
//! Lookups qualified with "in Wikipedia" (or similar) are answered on the
//! matching article. This is the most generic domain and is consulted last.

use regex::Regex;
use sdk::{Action, Observation};
use std::sync::OnceLock;

use super::{search_url, subject_query, terms_present, ContextStrategy};

const ENCYCLOPEDIA_SEARCH_BASE: &str = "https://en.wikipedia.org/wiki/Special:Search";

static APPLIES_PATTERN: OnceLock<Regex> = OnceLock::new();
static STRIP_PATTERN: OnceLock<Regex> = OnceLock::new();

fn applies_pattern() -> &'static Regex {
    APPLIES_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:wikipedia|encyclopedia|wiki)\b")
            .expect("Invalid encyclopedia applies pattern")
    })
}

fn strip_pattern() -> &'static Regex {
    STRIP_PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:the\s+)?(?:wikipedia|encyclopedia|wiki)(?:\s+(?:article|page|entry)(?:\s+(?:on|about|for))?)?\b",
        )
        .expect("Invalid encyclopedia strip pattern")
    })
}

/// Steers lookups onto an encyclopedia article
#[derive(Debug, Default, Clone, Copy)]
pub struct EncyclopediaStrategy;

impl EncyclopediaStrategy {
    pub fn new() -> Self {
        Self
    }

    fn on_article(observation: &Observation) -> bool {
        let on_host = observation
            .host()
            .map(|host| host == "wikipedia.org" || host.ends_with(".wikipedia.org"))
            .unwrap_or(false);
        let path = observation.path();
        on_host && path.starts_with("/wiki/") && !path.contains("Special:")
    }
}

impl ContextStrategy for EncyclopediaStrategy {
    fn name(&self) -> &'static str {
        "encyclopedia"
    }

    fn goal_applies(&self, goal: &str, _focus_entity: Option<&str>) -> bool {
        applies_pattern().is_match(goal)
    }

    fn ensure_context(
        &self,
        goal: &str,
        observation: &Observation,
        focus_entity: Option<&str>,
    ) -> Option<Action> {
        if !self.goal_applies(goal, focus_entity) {
            return None;
        }
        let query = subject_query(goal, focus_entity, strip_pattern())?;
        if Self::on_article(observation) && terms_present(observation, &query) {
            return None;
        }
        search_url(ENCYCLOPEDIA_SEARCH_BASE, &[("search", &query)]).map(Action::open_url)
    }

    fn is_satisfied(
        &self,
        goal: &str,
        observation: &Observation,
        focus_entity: Option<&str>,
    ) -> bool {
        if !self.goal_applies(goal, focus_entity) || !Self::on_article(observation) {
            return false;
        }
        subject_query(goal, focus_entity, strip_pattern())
            .map(|query| terms_present(observation, &query))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(slug: &str, title: &str) -> Observation {
        Observation {
            url: format!("https://en.wikipedia.org/wiki/{}", slug),
            title: format!("{} - Wikipedia", title),
            ..Default::default()
        }
    }

    #[test]
    fn test_goal_applies() {
        let strategy = EncyclopediaStrategy::new();
        assert!(strategy.goal_applies("look up Alan Turing in Wikipedia", None));
        assert!(strategy.goal_applies("open the wiki page for Rust", None));
        assert!(!strategy.goal_applies("look up Alan Turing", None));
    }

    #[test]
    fn test_ensure_context_searches_encyclopedia() {
        let strategy = EncyclopediaStrategy::new();
        let action = strategy
            .ensure_context("look up Alan Turing in Wikipedia", &Observation::unknown(), None)
            .unwrap();
        assert_eq!(
            action.arg("url"),
            Some("https://en.wikipedia.org/wiki/Special:Search?search=Alan+Turing")
        );
    }

    #[test]
    fn test_article_satisfies_and_stops_reorientation() {
        let strategy = EncyclopediaStrategy::new();
        let obs = article("Alan_Turing", "Alan Turing");
        let goal = "look up Alan Turing in Wikipedia";
        assert!(strategy.is_satisfied(goal, &obs, None));
        assert!(strategy.ensure_context(goal, &obs, None).is_none());
    }

    #[test]
    fn test_search_page_is_not_an_article() {
        let strategy = EncyclopediaStrategy::new();
        let obs = Observation {
            url: "https://en.wikipedia.org/wiki/Special:Search?search=Alan+Turing".to_string(),
            title: "Search results - Wikipedia".to_string(),
            ..Default::default()
        };
        assert!(!strategy.is_satisfied("look up Alan Turing in Wikipedia", &obs, None));
    }

    #[test]
    fn test_focus_entity_resolves_pronoun_goal() {
        let strategy = EncyclopediaStrategy::new();
        let obs = article("Ada_Lovelace", "Ada Lovelace");
        let goal = "find when she was born in Wikipedia";
        assert!(strategy.is_satisfied(goal, &obs, Some("Ada Lovelace")));
        assert!(!strategy.is_satisfied(goal, &obs, None));
    }
}
