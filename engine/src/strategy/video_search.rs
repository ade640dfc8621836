//! Video search strategy

use regex::Regex;
use sdk::{Action, Observation};
use std::sync::OnceLock;

use super::{search_url, subject_query, terms_present, ContextStrategy};

const VIDEO_SEARCH_BASE: &str = "https://www.youtube.com/results";

static APPLIES_PATTERN: OnceLock<Regex> = OnceLock::new();
static STRIP_PATTERN: OnceLock<Regex> = OnceLock::new();

fn applies_pattern() -> &'static Regex {
    APPLIES_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:videos?|youtube|clips?|trailers?)\b")
            .expect("Invalid video applies pattern")
    })
}

fn strip_pattern() -> &'static Regex {
    STRIP_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:an?\s+|some\s+)?(?:videos?|clips?|trailers?)(?:\s+(?:of|about|for))?\b")
            .expect("Invalid video strip pattern")
    })
}

/// Steers video goals onto a video results or watch page
#[derive(Debug, Default, Clone, Copy)]
pub struct VideoSearchStrategy;

impl VideoSearchStrategy {
    pub fn new() -> Self {
        Self
    }

    fn on_video_site(observation: &Observation) -> bool {
        let on_host = observation
            .host()
            .map(|host| host == "youtube.com" || host.ends_with(".youtube.com"))
            .unwrap_or(false);
        let path = observation.path();
        on_host && (path.starts_with("/results") || path.starts_with("/watch"))
    }
}

impl ContextStrategy for VideoSearchStrategy {
    fn name(&self) -> &'static str {
        "video_search"
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
        if Self::on_video_site(observation) && terms_present(observation, &query) {
            return None;
        }
        search_url(VIDEO_SEARCH_BASE, &[("search_query", &query)]).map(Action::open_url)
    }

    fn is_satisfied(
        &self,
        goal: &str,
        observation: &Observation,
        focus_entity: Option<&str>,
    ) -> bool {
        if !self.goal_applies(goal, focus_entity) || !Self::on_video_site(observation) {
            return false;
        }
        subject_query(goal, focus_entity, strip_pattern())
            .map(|query| terms_present(observation, &query))
            .unwrap_or(false)
    }
}
