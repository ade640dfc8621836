//! Strategy Registry
//!
//! Ordered, immutable set of context strategies. Order is priority: the most
//! specific domain is registered first so it wins when a goal matches several.
//! The registry is built once at startup and shared read-only, so it needs no
//! locking.

use sdk::{Action, EngineError, Observation};
use std::sync::Arc;
use tracing::debug;

use super::{ContextStrategy, EncyclopediaStrategy, ImageSearchStrategy, VideoSearchStrategy};

/// Reorientation chosen by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reorientation {
    /// Name of the strategy that produced the action
    pub strategy: &'static str,
    pub action: Action,
}

/// Priority-ordered collection of strategies
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn ContextStrategy>>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

impl StrategyRegistry {
    /// Create a registry from strategies already in priority order
    pub fn new(strategies: Vec<Arc<dyn ContextStrategy>>) -> Self {
        Self { strategies }
    }

    /// A registry with no strategies; every goal goes straight to the Planner
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Built-in strategies in their fixed priority order
    pub fn builtin() -> Self {
        Self::new(vec![
            Arc::new(ImageSearchStrategy::new()),
            Arc::new(VideoSearchStrategy::new()),
            Arc::new(EncyclopediaStrategy::new()),
        ])
    }

    /// Narrow the registry to the named strategies.
    ///
    /// Priority order is kept from `self`, not from `names`.
    pub fn subset(&self, names: &[String]) -> Result<Self, EngineError> {
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.strategies.iter().any(|s| s.name() == name.as_str()))
        {
            return Err(EngineError::UnknownStrategy(unknown.clone()));
        }

        Ok(Self::new(
            self.strategies
                .iter()
                .filter(|s| names.iter().any(|name| name == s.name()))
                .cloned()
                .collect(),
        ))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Highest-priority strategy whose domain covers `goal`
    pub fn applicable(&self, goal: &str, focus_entity: Option<&str>) -> Option<&dyn ContextStrategy> {
        self.strategies
            .iter()
            .find(|s| s.goal_applies(goal, focus_entity))
            .map(|s| s.as_ref())
    }

    /// Priority index of the strategy that would handle `goal` (0 = most specific)
    pub fn priority_of(&self, goal: &str) -> Option<usize> {
        self.strategies.iter().position(|s| s.goal_applies(goal, None))
    }

    /// Reorientation from the strategy that owns `goal`.
    ///
    /// Lower-priority strategies are never consulted once a higher one
    /// applies, even when it has nothing to do: their navigation could not
    /// satisfy `is_any_satisfied` anyway.
    pub fn resolve(
        &self,
        goal: &str,
        observation: &Observation,
        focus_entity: Option<&str>,
    ) -> Option<Reorientation> {
        let strategy = self.applicable(goal, focus_entity)?;
        let action = strategy.ensure_context(goal, observation, focus_entity)?;
        debug!("Strategy {} reorients with {}", strategy.name(), action);
        Some(Reorientation {
            strategy: strategy.name(),
            action,
        })
    }

    /// True iff the applicable strategy reports the goal satisfied
    pub fn is_any_satisfied(
        &self,
        goal: &str,
        observation: &Observation,
        focus_entity: Option<&str>,
    ) -> bool {
        self.applicable(goal, focus_entity)
            .map(|strategy| strategy.is_satisfied(goal, observation, focus_entity))
            .unwrap_or(false)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_priority_order() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(registry.names(), vec!["image_search", "video_search", "encyclopedia"]);
    }

    #[test]
    fn test_specific_domain_wins() {
        let registry = StrategyRegistry::builtin();
        let goal = "find pictures of Alan Turing in Wikipedia";

        let strategy = registry.applicable(goal, None).unwrap();
        assert_eq!(strategy.name(), "image_search");

        let reorientation = registry.resolve(goal, &Observation::unknown(), None).unwrap();
        assert_eq!(reorientation.strategy, "image_search");
    }

    #[test]
    fn test_resolve_none_when_nothing_applies() {
        let registry = StrategyRegistry::builtin();
        assert!(registry
            .resolve("book a table for two", &Observation::unknown(), None)
            .is_none());
        assert!(!registry.is_any_satisfied("book a table for two", &Observation::unknown(), None));
    }

    #[test]
    fn test_is_any_satisfied_uses_first_applicable_only() {
        let registry = StrategyRegistry::builtin();
        let article = Observation {
            url: "https://en.wikipedia.org/wiki/Alan_Turing".to_string(),
            title: "Alan Turing - Wikipedia".to_string(),
            ..Default::default()
        };
        // The image strategy owns this goal, so an article does not count.
        assert!(!registry.is_any_satisfied("pictures of Alan Turing in Wikipedia", &article, None));
        assert!(registry.is_any_satisfied("Alan Turing in Wikipedia", &article, None));
    }

    #[test]
    fn test_resolve_stays_with_owning_strategy() {
        let registry = StrategyRegistry::builtin();
        let goal = "show me pictures in Wikipedia";
        assert_eq!(registry.applicable(goal, None).unwrap().name(), "image_search");

        // No subject to search images for; the encyclopedia must not step in
        assert!(registry.resolve(goal, &Observation::unknown(), None).is_none());

        let reorientation = registry
            .resolve(goal, &Observation::unknown(), Some("Alan Turing"))
            .unwrap();
        assert_eq!(reorientation.strategy, "image_search");
    }

    #[test]
    fn test_subset_keeps_priority_order() {
        let registry = StrategyRegistry::builtin();
        let subset = registry
            .subset(&["encyclopedia".to_string(), "image_search".to_string()])
            .unwrap();
        assert_eq!(subset.names(), vec!["image_search", "encyclopedia"]);
    }

    #[test]
    fn test_subset_rejects_unknown_names() {
        let registry = StrategyRegistry::builtin();
        let err = registry.subset(&["maps".to_string()]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy(name) if name == "maps"));
    }

    #[test]
    fn test_priority_of() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(registry.priority_of("images of cats"), Some(0));
        assert_eq!(registry.priority_of("in Wikipedia"), Some(2));
        assert_eq!(registry.priority_of("book a flight"), None);
        assert!(StrategyRegistry::empty().is_empty());
    }
}
