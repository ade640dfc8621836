//! Goal Decomposer
//!
//! Splits a compound goal into ordered sub-goals on sequential connector
//! phrases ("and then", "; then", "and finally", ...), propagates a shared
//! domain qualifier ("... in Wikipedia") onto the parts that lack one, and
//! extracts explicitly named entities so later sub-goals can resolve pronouns.
//!
//! Everything here is pure and deterministic.

use regex::Regex;
use std::sync::OnceLock;

use crate::conductor::types::SubGoal;
use crate::strategy::{domain_qualifier_pattern, StrategyRegistry};

static CONNECTOR_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Sequential connector phrases, matched case-insensitively.
fn connector_pattern() -> &'static Regex {
    CONNECTOR_PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(?:[,;]\s*)?\b(?:and\s+then|and\s+finally|and\s+after\s+that|after\s+that|then\s+finally)\b,?|;\s*(?:then|finally)\b,?|,\s*then\b,?",
        )
        .expect("Invalid connector pattern")
    })
}

/// Words that may sit inside a multi-word name without ending it
const NAME_CONNECTORS: &[&str] = &["of", "the", "and", "in"];

/// Third-person pronouns that refer back to an earlier entity
const PRONOUNS: &[&str] = &[
    "he", "she", "it", "they", "him", "her", "them", "his", "hers", "its", "their", "theirs",
];

/// Capitalized words that start requests rather than name things
const REQUEST_WORDS: &[&str] = &[
    "find", "search", "look", "show", "get", "open", "tell", "what", "who", "when", "where",
    "which", "how", "why", "watch", "play", "list", "give", "compare", "then", "and", "please",
    "also", "now", "i", "me", "my", "a", "an",
];

fn trim_boundary(part: &str) -> &str {
    part.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '.'))
}

/// Splits goals into sub-goals
pub struct GoalDecomposer<'a> {
    registry: &'a StrategyRegistry,
}

impl<'a> GoalDecomposer<'a> {
    /// The registry decides which parts belong to a more specific domain than
    /// the shared qualifier.
    pub fn new(registry: &'a StrategyRegistry) -> Self {
        Self { registry }
    }

    /// Split `goal` into ordered sub-goals, indexed from 1.
    pub fn decompose(&self, goal: &str) -> Vec<SubGoal> {
        let trimmed = goal.trim();

        if !connector_pattern().is_match(trimmed) {
            return vec![Self::sub_goal(1, trimmed.to_string())];
        }

        let parts: Vec<&str> = connector_pattern()
            .split(trimmed)
            .map(trim_boundary)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            return vec![Self::sub_goal(1, trimmed.to_string())];
        }

        let texts = if parts.len() > 1 {
            self.propagate_qualifier(trimmed, &parts)
        } else {
            parts.iter().map(|p| p.to_string()).collect()
        };

        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self::sub_goal(i + 1, text))
            .collect()
    }

    fn sub_goal(index: usize, text: String) -> SubGoal {
        let focus_entity = extract_entity(&text);
        SubGoal {
            index,
            text,
            focus_entity,
        }
    }

    /// Append the goal's shared domain qualifier to parts that lack one,
    /// unless the part already belongs to a higher-priority domain.
    fn propagate_qualifier(&self, goal: &str, parts: &[&str]) -> Vec<String> {
        let Some(qualifier) = domain_qualifier_pattern()
            .find_iter(goal)
            .last()
            .map(|m| m.as_str().to_string())
        else {
            return parts.iter().map(|p| p.to_string()).collect();
        };

        let qualifier_priority = self.registry.priority_of(&qualifier);

        parts
            .iter()
            .map(|part| {
                if domain_qualifier_pattern().is_match(part) {
                    return part.to_string();
                }
                let outranks_qualifier = match (self.registry.priority_of(part), qualifier_priority) {
                    (Some(own), Some(shared)) => own < shared,
                    (Some(_), None) => true,
                    _ => false,
                };
                if outranks_qualifier {
                    part.to_string()
                } else {
                    format!("{} {}", part, qualifier)
                }
            })
            .collect()
    }
}

struct Token<'t> {
    word: &'t str,
    breaks_after: bool,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    text.split_whitespace()
        .filter_map(|raw| {
            let breaks_after = raw.ends_with([',', ';', ':', '.', '?', '!', ')']);
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '’');
            let word = word
                .strip_suffix("'s")
                .or_else(|| word.strip_suffix("’s"))
                .unwrap_or(word)
                .trim_matches(|c: char| c == '\'' || c == '’');
            if word.is_empty() {
                None
            } else {
                Some(Token { word, breaks_after })
            }
        })
        .collect()
}

fn is_name_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    word.chars().next().map(char::is_uppercase).unwrap_or(false)
        && !PRONOUNS.contains(&lower.as_str())
        && !REQUEST_WORDS.contains(&lower.as_str())
}

fn is_connector(word: &str) -> bool {
    NAME_CONNECTORS.contains(&word.to_lowercase().as_str())
}

/// Sentence case capitalizes an opening verb ("Describe", "Visit") just like
/// a name, so the first word only starts a name when exactly one more name
/// word follows it directly ("Ada Lovelace"). Followed by lowercase text, an
/// article or a longer name, it is the request.
fn opens_with_request(run: &[Token<'_>]) -> bool {
    let followers = run[1..].iter().filter(|t| !is_connector(t.word)).count();
    let next_is_connector = run.get(1).map_or(false, |t| is_connector(t.word));
    followers != 1 || next_is_connector
}

/// Extract the last explicitly named entity: a run of capitalized words,
/// allowing "of/the/and/in" inside the run so compound names stay whole.
/// Domain qualifiers such as "in Wikipedia" are ignored.
pub fn extract_entity(text: &str) -> Option<String> {
    let without_qualifier = domain_qualifier_pattern().replace_all(text, " ");
    let tokens = tokenize(&without_qualifier);

    let end = tokens.iter().rposition(|t| is_name_word(t.word))?;
    let mut start = end;
    while start > 0 {
        let prev = &tokens[start - 1];
        if prev.breaks_after || !(is_name_word(prev.word) || is_connector(prev.word)) {
            break;
        }
        start -= 1;
    }

    let mut run = &tokens[start..=end];
    if start == 0 && tokens.len() > 1 && opens_with_request(run) {
        run = &run[1..];
    }
    let first = run.iter().position(|t| !is_connector(t.word))?;
    let words: Vec<&str> = run[first..].iter().map(|t| t.word).collect();
    Some(words.join(" "))
}

/// True when the text refers back to something with a third-person pronoun
pub fn contains_pronoun(text: &str) -> bool {
    tokenize(text)
        .iter()
        .any(|t| PRONOUNS.contains(&t.word.to_lowercase().as_str()))
}

/// Focus entity for a sub-goal: its own explicit entity, otherwise the last
/// named entity when the sub-goal uses a pronoun. Never the goal text itself.
pub fn resolve_focus(sub_goal: &SubGoal, last_named: Option<&str>) -> Option<String> {
    if let Some(entity) = &sub_goal.focus_entity {
        return Some(entity.clone());
    }
    if contains_pronoun(&sub_goal.text) {
        return last_named.map(str::to_string);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(goal: &str) -> Vec<String> {
        let registry = StrategyRegistry::builtin();
        GoalDecomposer::new(&registry)
            .decompose(goal)
            .into_iter()
            .map(|s| s.text)
            .collect()
    }

    #[test]
    fn test_no_connector_returns_trimmed_goal() {
        assert_eq!(texts("  find the weather in Paris "), vec!["find the weather in Paris"]);
    }

    #[test]
    fn test_split_on_and_then() {
        assert_eq!(texts("find X and then find Y"), vec!["find X", "find Y"]);
    }

    #[test]
    fn test_split_mixed_connectors_in_order() {
        assert_eq!(
            texts("open the page; then accept cookies, then search rust And Finally read it."),
            vec!["open the page", "accept cookies", "search rust", "read it"]
        );
    }

    #[test]
    fn test_indices_are_contiguous() {
        let registry = StrategyRegistry::builtin();
        let subs = GoalDecomposer::new(&registry).decompose("a and then b and then c");
        let indices: Vec<usize> = subs.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_parts_are_dropped() {
        assert_eq!(texts("and then find Y"), vec!["find Y"]);
        assert_eq!(texts(" and then "), vec!["and then"]);
    }

    #[test]
    fn test_qualifier_propagates_to_parts_lacking_it() {
        assert_eq!(
            texts("look up Alan Turing and then find his birthplace in Wikipedia"),
            vec![
                "look up Alan Turing in Wikipedia",
                "find his birthplace in Wikipedia"
            ]
        );
    }

    #[test]
    fn test_qualifier_skips_higher_priority_domain() {
        assert_eq!(
            texts("look up Marie Curie and then show me pictures of her in Wikipedia"),
            vec!["look up Marie Curie in Wikipedia", "show me pictures of her in Wikipedia"]
        );
        assert_eq!(
            texts("show me pictures of Marie Curie and then find her birthplace in Wikipedia"),
            vec!["show me pictures of Marie Curie", "find her birthplace in Wikipedia"]
        );
    }

    #[test]
    fn test_extract_entity_compound_names() {
        assert_eq!(
            extract_entity("find the birthplace of Ada Lovelace").as_deref(),
            Some("Ada Lovelace")
        );
        assert_eq!(
            extract_entity("look up the Bank of England").as_deref(),
            Some("Bank of England")
        );
        assert_eq!(
            extract_entity("What did Charles Babbage invent?").as_deref(),
            Some("Charles Babbage")
        );
    }

    #[test]
    fn test_extract_entity_ignores_qualifier_and_pronouns() {
        assert_eq!(extract_entity("Find pictures of her in Wikipedia"), None);
        assert_eq!(
            extract_entity("look up Alan Turing in Wikipedia").as_deref(),
            Some("Alan Turing")
        );
        assert_eq!(extract_entity("find when she was born"), None);
    }

    #[test]
    fn test_extract_entity_respects_punctuation_breaks() {
        assert_eq!(
            extract_entity("compare Paris, France").as_deref(),
            Some("France")
        );
        assert_eq!(
            extract_entity("read Ada Lovelace's notes").as_deref(),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn test_extract_entity_skips_opening_verb() {
        assert_eq!(
            extract_entity("Describe Alan Turing in Wikipedia").as_deref(),
            Some("Alan Turing")
        );
        assert_eq!(
            extract_entity("Visit Alan Turing").as_deref(),
            Some("Alan Turing")
        );
        assert_eq!(
            extract_entity("Explain the Bank of England").as_deref(),
            Some("Bank of England")
        );
        assert_eq!(extract_entity("Summarize the headlines"), None);
    }

    #[test]
    fn test_extract_entity_keeps_opening_name() {
        assert_eq!(
            extract_entity("Ada Lovelace in Wikipedia").as_deref(),
            Some("Ada Lovelace")
        );
        assert_eq!(extract_entity("Turing").as_deref(), Some("Turing"));
    }

    #[test]
    fn test_contains_pronoun() {
        assert!(contains_pronoun("find when she was born"));
        assert!(contains_pronoun("show me pictures of Him."));
        assert!(!contains_pronoun("find the birthplace of Ada Lovelace"));
        assert!(!contains_pronoun("Theirsomething"));
    }

    #[test]
    fn test_resolve_focus_falls_back_to_last_named() {
        let explicit = SubGoal {
            index: 1,
            text: "find Ada Lovelace".to_string(),
            focus_entity: Some("Ada Lovelace".to_string()),
        };
        let pronoun = SubGoal {
            index: 2,
            text: "find when she was born".to_string(),
            focus_entity: None,
        };
        let neither = SubGoal {
            index: 3,
            text: "accept cookies".to_string(),
            focus_entity: None,
        };

        assert_eq!(resolve_focus(&explicit, Some("Someone")).as_deref(), Some("Ada Lovelace"));
        assert_eq!(resolve_focus(&pronoun, Some("Ada Lovelace")).as_deref(), Some("Ada Lovelace"));
        assert_eq!(resolve_focus(&pronoun, None), None);
        assert_eq!(resolve_focus(&neither, Some("Ada Lovelace")), None);
    }
}
