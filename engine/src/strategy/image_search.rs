//! Image search strategy
//!
//! Goals asking for pictures of something are answered on an image results
//! page. This is the most specific domain and sits first in the registry.

use regex::Regex;
use sdk::{Action, Observation};
use std::sync::OnceLock;

use super::{search_url, subject_query, terms_present, ContextStrategy};

const IMAGE_SEARCH_BASE: &str = "https://www.google.com/search";

static APPLIES_PATTERN: OnceLock<Regex> = OnceLock::new();
static STRIP_PATTERN: OnceLock<Regex> = OnceLock::new();

fn applies_pattern() -> &'static Regex {
    APPLIES_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:images?|pictures?|photos?|photographs?)\b")
            .expect("Invalid image applies pattern")
    })
}

fn strip_pattern() -> &'static Regex {
    STRIP_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:some\s+)?(?:images?|pictures?|photos?|photographs?)(?:\s+of)?\b")
            .expect("Invalid image strip pattern")
    })
}

/// Steers image goals onto an image results page
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageSearchStrategy;

impl ImageSearchStrategy {
    pub fn new() -> Self {
        Self
    }

    fn on_image_results(observation: &Observation) -> bool {
        let Some(host) = observation.host() else {
            return false;
        };
        let url = observation.url.to_lowercase();

        (host.contains("google.") && url.contains("tbm=isch"))
            || host.starts_with("images.")
            || (host.ends_with("bing.com") && observation.path().starts_with("/images"))
            || (host.contains("duckduckgo.") && url.contains("ia=images"))
    }
}

impl ContextStrategy for ImageSearchStrategy {
    fn name(&self) -> &'static str {
        "image_search"
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
        if Self::on_image_results(observation) && terms_present(observation, &query) {
            return None;
        }
        search_url(IMAGE_SEARCH_BASE, &[("tbm", "isch"), ("q", &query)]).map(Action::open_url)
    }

    fn is_satisfied(
        &self,
        goal: &str,
        observation: &Observation,
        focus_entity: Option<&str>,
    ) -> bool {
        if !self.goal_applies(goal, focus_entity) || !Self::on_image_results(observation) {
            return false;
        }
        subject_query(goal, focus_entity, strip_pattern())
            .map(|query| terms_present(observation, &query))
            .unwrap_or(false)
    }
}
