//! Flow definitions and the tag-keyed definition registry.
//!
//! A definition is the authoring-side strategy for one event tag: it
//! validates the triggering event and emits the flow's instructions
//! through a [`ProgramBuilder`]. Lookup falls back through the tag's
//! hierarchical ancestors, most specific first, and memoizes results
//! (including misses) until the registry changes.

use flow_bytecode::{ProgramBuilder, Result as BytecodeResult};
use hashbrown::HashMap;
use rustc_hash::FxHashMap;

use crate::event::GameplayEvent;
use crate::tag::FlowTag;

/// Named gameplay constants passed through to definitions at build time.
///
/// Content-free from the core's perspective: damage numbers, speeds, and
/// radii live here so flow authoring stays data-driven.
#[derive(Debug, Default)]
pub struct FlowTuning {
    values: FxHashMap<String, f32>,
}

impl FlowTuning {
    /// An empty tuning table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a named constant.
    pub fn set(&mut self, name: &str, value: f32) {
        self.values.insert(name.to_owned(), value);
    }

    /// Read a named constant, falling back to a default.
    #[must_use]
    pub fn get_or(&self, name: &str, default: f32) -> f32 {
        self.values.get(name).copied().unwrap_or(default)
    }
}

/// Builds a program for one event tag.
pub trait FlowDefinition {
    /// Whether the triggering event carries everything this flow needs.
    fn validate(&self, _event: &GameplayEvent) -> bool {
        true
    }

    /// Emit the flow's instructions.
    fn build(
        &self,
        event: &GameplayEvent,
        tuning: &FlowTuning,
        builder: &mut ProgramBuilder,
    ) -> BytecodeResult<()>;
}

/// Adapter so a closure can serve as a definition.
pub struct DefinitionFn<F>(pub F);

impl<F> FlowDefinition for DefinitionFn<F>
where
    F: Fn(&GameplayEvent, &FlowTuning, &mut ProgramBuilder) -> BytecodeResult<()>,
{
    fn build(
        &self,
        event: &GameplayEvent,
        tuning: &FlowTuning,
        builder: &mut ProgramBuilder,
    ) -> BytecodeResult<()> {
        (self.0)(event, tuning, builder)
    }
}

/// Tag-keyed registry of flow definitions with ancestor fallback.
#[derive(Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<FlowTag, Box<dyn FlowDefinition>>,
    /// Memoized resolution results, including misses. Cleared whenever
    /// the registered set changes.
    memo: FxHashMap<FlowTag, Option<FlowTag>>,
}

impl DefinitionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition for a tag, replacing any previous one.
    pub fn register(&mut self, tag: FlowTag, definition: Box<dyn FlowDefinition>) {
        self.definitions.insert(tag, definition);
        self.memo.clear();
    }

    /// Remove a tag's definition.
    pub fn remove(&mut self, tag: &FlowTag) {
        if self.definitions.remove(tag).is_some() {
            self.memo.clear();
        }
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no definitions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Find the definition for a tag, falling back to its most specific
    /// registered ancestor. Memoizes the outcome either way.
    pub fn find(&mut self, tag: &FlowTag) -> Option<&dyn FlowDefinition> {
        let resolved = if let Some(cached) = self.memo.get(tag) {
            cached.clone()
        } else {
            let resolved = self.lookup(tag);
            self.memo.insert(tag.clone(), resolved.clone());
            resolved
        };
        resolved.and_then(|t| self.definitions.get(&t).map(Box::as_ref))
    }

    fn lookup(&self, tag: &FlowTag) -> Option<FlowTag> {
        if self.definitions.contains_key(tag) {
            return Some(tag.clone());
        }
        let mut ancestors: Vec<FlowTag> = tag.ancestors().collect();
        // Most specific ancestor wins.
        ancestors.sort_by_key(|t| std::cmp::Reverse(t.specificity()));
        ancestors
            .into_iter()
            .find(|t| self.definitions.contains_key(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_definition() -> Box<dyn FlowDefinition> {
        Box::new(DefinitionFn(|_: &GameplayEvent, _: &FlowTuning, b: &mut ProgramBuilder| {
            b.end();
            Ok(())
        }))
    }

    #[test]
    fn test_exact_match_wins() {
        let mut registry = DefinitionRegistry::new();
        registry.register(FlowTag::new("ability"), noop_definition());
        registry.register(FlowTag::new("ability.fire.fireball"), noop_definition());

        assert!(registry.find(&FlowTag::new("ability.fire.fireball")).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ancestor_fallback_most_specific() {
        let mut registry = DefinitionRegistry::new();
        registry.register(FlowTag::new("ability"), noop_definition());
        registry.register(FlowTag::new("ability.fire"), noop_definition());

        // Resolves to ability.fire, not the broader ability.
        let tag = FlowTag::new("ability.fire.fireball");
        assert!(registry.find(&tag).is_some());
        assert_eq!(
            registry.memo.get(&tag).unwrap().as_ref().unwrap().as_str(),
            "ability.fire"
        );
    }

    #[test]
    fn test_miss_is_memoized_and_invalidated() {
        let mut registry = DefinitionRegistry::new();
        let tag = FlowTag::new("ability.frost.nova");
        assert!(registry.find(&tag).is_none());
        assert!(registry.memo.contains_key(&tag));

        // Registering anything clears the memo so the miss is retried.
        registry.register(FlowTag::new("ability.frost"), noop_definition());
        assert!(registry.memo.is_empty());
        assert!(registry.find(&tag).is_some());
    }

    #[test]
    fn test_remove_invalidates() {
        let mut registry = DefinitionRegistry::new();
        let tag = FlowTag::new("ability.fire");
        registry.register(tag.clone(), noop_definition());
        assert!(registry.find(&tag).is_some());

        registry.remove(&tag);
        assert!(registry.find(&tag).is_none());
    }

    #[test]
    fn test_tuning_defaults() {
        let mut tuning = FlowTuning::new();
        tuning.set("fireball.damage", 100.0);
        assert_eq!(tuning.get_or("fireball.damage", 1.0), 100.0);
        assert_eq!(tuning.get_or("missing", 42.0), 42.0);
    }
}
