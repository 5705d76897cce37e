//! Stage registry: module type name -> stage constructor.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::PipeGraph;
use crate::pipeline::module_type::SUBPIPE_PREFIX;
use crate::pipeline::modules::{self, SubpipeFactory};
use crate::pipeline::stage::StageFactory;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registered stage constructors, keyed by module type string.
///
/// Populated once at start-up; registering a type twice is an error.
#[derive(Default)]
pub struct StageRegistry {
    factories: HashMap<String, Arc<dyn StageFactory>>,
}

impl StageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in module type.
    pub fn with_builtins() -> PipelineResult<Self> {
        let mut registry = Self::new();
        modules::register_builtins(&mut registry)?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        module_type: impl Into<String>,
        factory: Arc<dyn StageFactory>,
    ) -> PipelineResult<()> {
        let module_type = module_type.into();
        if self.factories.contains_key(&module_type) {
            return Err(PipelineError::DuplicateModuleType(module_type));
        }
        debug!(module_type = %module_type, "Registered stage constructor");
        self.factories.insert(module_type, factory);
        Ok(())
    }

    /// Register a compiled pipe as module type `pipe:<name>`.
    pub fn register_pipe(&mut self, name: &str, graph: PipeGraph) -> PipelineResult<()> {
        self.register(
            format!("{SUBPIPE_PREFIX}{name}"),
            Arc::new(SubpipeFactory::new(graph)),
        )
    }

    pub fn get(&self, module_type: &str) -> PipelineResult<Arc<dyn StageFactory>> {
        self.factories
            .get(module_type)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownModuleType(module_type.to_string()))
    }

    pub fn contains(&self, module_type: &str) -> bool {
        self.factories.contains_key(module_type)
    }

    /// Registered type names, sorted.
    pub fn module_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("module_types", &self.module_types())
            .finish()
    }
}
