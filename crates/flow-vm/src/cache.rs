//! Program cache and build processor.
//!
//! One immutable program per event tag, built on first use and shared
//! as `Arc<Program>` afterwards. Compilation runs through a pooled
//! scratch buffer; failures surface as [`FlowError`] values and leave
//! the cache untouched.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::definition::{DefinitionRegistry, FlowTuning};
use crate::error::{FlowError, FlowResult};
use crate::event::GameplayEvent;
use crate::pool::BytecodePool;
use crate::program::Program;
use crate::tag::FlowTag;
use flow_bytecode::ProgramBuilder;

/// Tag-keyed cache of compiled programs.
#[derive(Default)]
pub struct ProgramCache {
    programs: HashMap<FlowTag, Arc<Program>>,
}

impl ProgramCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached programs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Drop one tag's cached program (e.g. after re-registering its
    /// definition).
    pub fn invalidate(&mut self, tag: &FlowTag) {
        self.programs.remove(tag);
    }

    /// Drop every cached program.
    pub fn clear(&mut self) {
        self.programs.clear();
    }

    /// Fetch the program for the event's tag, building it on first use.
    ///
    /// Build failures are returned, never cached; a later event retries.
    pub fn get_or_build(
        &mut self,
        event: &GameplayEvent,
        tuning: &FlowTuning,
        definitions: &mut DefinitionRegistry,
        buffers: &mut BytecodePool,
    ) -> FlowResult<Arc<Program>> {
        let tag = &event.tag;
        if let Some(program) = self.programs.get(tag) {
            return Ok(Arc::clone(program));
        }

        let Some(definition) = definitions.find(tag) else {
            return Err(FlowError::FlowDefinitionNotFound { tag: tag.clone() });
        };
        if !definition.validate(event) {
            return Err(FlowError::InvalidEventData { tag: tag.clone() });
        }

        let mut builder = ProgramBuilder::with_buffer(buffers.acquire());
        let built = definition
            .build(event, tuning, &mut builder)
            .and_then(|()| builder.finish());
        match built {
            Ok(bytes) => {
                let program = Arc::new(Program::new(tag.clone(), &bytes));
                buffers.release(bytes);
                self.programs.insert(tag.clone(), Arc::clone(&program));
                Ok(program)
            }
            Err(source) => {
                // The builder consumed the pooled buffer.
                buffers.discard();
                Err(FlowError::BuildFailed {
                    tag: tag.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use flow_bytecode::Result as BytecodeResult;
    use flow_db::{Generation, UnitHandle};

    use crate::definition::DefinitionFn;

    use super::*;

    fn event(tag: &str) -> GameplayEvent {
        GameplayEvent::new(1, UnitHandle::new(0, Generation::new()), FlowTag::new(tag))
    }

    fn wait_definition() -> Box<dyn FlowDefinition> {
        Box::new(DefinitionFn(
            |_: &GameplayEvent, tuning: &FlowTuning, b: &mut ProgramBuilder| {
                b.wait_seconds(tuning.get_or("wait", 1.0)).end();
                Ok(())
            },
        ))
    }

    use crate::definition::FlowDefinition;

    #[test]
    fn test_build_then_hit() {
        let mut cache = ProgramCache::new();
        let mut definitions = DefinitionRegistry::new();
        let mut buffers = BytecodePool::new(4);
        let tuning = FlowTuning::new();
        definitions.register(FlowTag::new("ability.wait"), wait_definition());

        let first = cache
            .get_or_build(&event("ability.wait"), &tuning, &mut definitions, &mut buffers)
            .unwrap();
        assert_eq!(first.instruction_count(), 2);
        assert_eq!(cache.len(), 1);

        let second = cache
            .get_or_build(&event("ability.wait"), &tuning, &mut definitions, &mut buffers)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // The compilation buffer went back to the pool.
        assert_eq!(buffers.stats().active, 0);
    }

    #[test]
    fn test_missing_definition() {
        let mut cache = ProgramCache::new();
        let mut definitions = DefinitionRegistry::new();
        let mut buffers = BytecodePool::new(4);
        let tuning = FlowTuning::new();

        let result =
            cache.get_or_build(&event("unknown.tag"), &tuning, &mut definitions, &mut buffers);
        assert!(matches!(
            result,
            Err(FlowError::FlowDefinitionNotFound { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_validation_failure() {
        struct Rejecting;
        impl FlowDefinition for Rejecting {
            fn validate(&self, _event: &GameplayEvent) -> bool {
                false
            }
            fn build(
                &self,
                _event: &GameplayEvent,
                _tuning: &FlowTuning,
                _builder: &mut ProgramBuilder,
            ) -> BytecodeResult<()> {
                Ok(())
            }
        }

        let mut cache = ProgramCache::new();
        let mut definitions = DefinitionRegistry::new();
        let mut buffers = BytecodePool::new(4);
        let tuning = FlowTuning::new();
        definitions.register(FlowTag::new("ability.bad"), Box::new(Rejecting));

        let result =
            cache.get_or_build(&event("ability.bad"), &tuning, &mut definitions, &mut buffers);
        assert!(matches!(result, Err(FlowError::InvalidEventData { .. })));
    }

    #[test]
    fn test_emission_failure_not_cached() {
        let broken: Box<dyn FlowDefinition> = Box::new(DefinitionFn(
            |_: &GameplayEvent, _: &FlowTuning, b: &mut ProgramBuilder| {
                b.end_for_each(); // no open loop: latched error
                Ok(())
            },
        ));

        let mut cache = ProgramCache::new();
        let mut definitions = DefinitionRegistry::new();
        let mut buffers = BytecodePool::new(4);
        let tuning = FlowTuning::new();
        definitions.register(FlowTag::new("ability.broken"), broken);

        let result =
            cache.get_or_build(&event("ability.broken"), &tuning, &mut definitions, &mut buffers);
        assert!(matches!(result, Err(FlowError::BuildFailed { .. })));
        assert!(cache.is_empty());
        // The lost buffer is accounted for.
        assert_eq!(buffers.stats().active, 0);
    }

    #[test]
    fn test_fallback_tag_builds_under_event_tag() {
        let mut cache = ProgramCache::new();
        let mut definitions = DefinitionRegistry::new();
        let mut buffers = BytecodePool::new(4);
        let tuning = FlowTuning::new();
        definitions.register(FlowTag::new("ability"), wait_definition());

        cache
            .get_or_build(
                &event("ability.fire.fireball"),
                &tuning,
                &mut definitions,
                &mut buffers,
            )
            .unwrap();
        // Cached under the event's own tag, so the fallback walk runs once.
        assert_eq!(cache.len(), 1);
        let hit = cache
            .get_or_build(
                &event("ability.fire.fireball"),
                &tuning,
                &mut definitions,
                &mut buffers,
            )
            .unwrap();
        assert_eq!(hit.tag().as_str(), "ability.fire.fireball");
    }
}
