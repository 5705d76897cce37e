//! Wiring resolution.
//!
//! Walks the topological order and turns every module into a [`PlanStep`]:
//! where its primary input comes from, which auxiliary inputs it receives,
//! which embedded module a loop invokes and how many branches a split serves.

use crate::pipeline::compiled_plan::{InputSource, PlanStep, ResolvedArgs};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::{GraphModel, Module};
use crate::pipeline::id::{normalize, ModuleId, WireId};
use crate::pipeline::module_type::{LOOP, SPLIT};
use tracing::{debug, warn};

/// Fan-out of a split that has no outgoing wires yet.
pub const DEFAULT_SPLITS: usize = 2;

pub struct WiringResolver<'a> {
    model: &'a GraphModel,
}

impl<'a> WiringResolver<'a> {
    pub fn new(model: &'a GraphModel) -> Self {
        Self { model }
    }

    /// Resolve every module of `order`.
    pub fn resolve(&self, order: &[ModuleId]) -> PipelineResult<Vec<PlanStep>> {
        let last = order.last();
        order
            .iter()
            .map(|id| {
                let module = self.lookup(id)?;
                let step = self.resolve_module(module, last == Some(id))?;
                debug!(module = %id, "Resolved {}", step);
                Ok(step)
            })
            .collect()
    }

    fn lookup(&self, id: &ModuleId) -> PipelineResult<&'a Module> {
        self.model.module(id).ok_or_else(|| {
            PipelineError::malformed(format!("/modules/{id}"), "module vanished during compile")
        })
    }

    fn resolve_module(&self, module: &Module, is_last: bool) -> PipelineResult<PlanStep> {
        let args = ResolvedArgs {
            input: self.default_input(module)?,
            inputs: self.named_inputs(module)?,
            embed: self.embed(module)?,
            splits: self.splits(module),
            conf: module.conf.clone(),
        };

        Ok(PlanStep {
            module_id: module.id.clone(),
            module_type: module.module_type.clone(),
            embedded: module.is_embedded(),
            args,
            consumers: self.consumers(module, is_last),
        })
    }

    fn default_input(&self, module: &Module) -> PipelineResult<InputSource> {
        if module.is_embedded() {
            return Ok(InputSource::Runtime);
        }

        match self.model.wires.iter().find(|w| w.is_default_input_of(&module.id)) {
            Some(wire) => {
                self.check_source(wire.id.clone(), &wire.source.module_id)?;
                Ok(InputSource::Module(wire.source.module_id.clone()))
            }
            None => Ok(InputSource::Forever),
        }
    }

    fn named_inputs(&self, module: &Module) -> PipelineResult<Vec<(String, ModuleId)>> {
        let wires: Vec<_> = self
            .model
            .wires
            .iter()
            .filter(|w| w.is_named_input_of(&module.id))
            .collect();

        if module.is_embedded() {
            if !wires.is_empty() {
                warn!(
                    module = %module.id,
                    "Ignoring {} auxiliary wire(s) into embedded module",
                    wires.len()
                );
            }
            return Ok(Vec::new());
        }

        let mut inputs: Vec<(String, ModuleId)> = Vec::with_capacity(wires.len());
        for wire in wires {
            self.check_source(wire.id.clone(), &wire.source.module_id)?;
            let name = normalize(wire.target.terminal.name());
            if inputs.iter().any(|(existing, _)| existing == &name) {
                return Err(PipelineError::malformed(
                    format!("/wires/{}", wire.id),
                    format!("input '{}' of module '{}' is wired twice", name, module.id),
                ));
            }
            inputs.push((name, wire.source.module_id.clone()));
        }
        Ok(inputs)
    }

    fn embed(&self, module: &Module) -> PipelineResult<Option<ModuleId>> {
        if module.module_type != LOOP {
            return Ok(None);
        }
        match module.embed_id() {
            Some(embed) if self.model.contains(&embed) => Ok(Some(embed)),
            _ => Err(PipelineError::malformed(
                format!("/modules/{}/conf/embed/value/id", module.id),
                "loop references no embedded module",
            )),
        }
    }

    /// Outgoing wire count of a split, or [`DEFAULT_SPLITS`] when it has none.
    fn splits(&self, module: &Module) -> Option<usize> {
        if module.module_type != SPLIT {
            return None;
        }
        let outgoing = self
            .model
            .wires
            .iter()
            .filter(|w| w.source.module_id == module.id)
            .count();
        Some(if outgoing == 0 { DEFAULT_SPLITS } else { outgoing })
    }

    fn consumers(&self, module: &Module, is_last: bool) -> usize {
        let wired = self
            .model
            .wires
            .iter()
            .filter(|w| w.source.module_id == module.id && w.source.terminal.is_output())
            .count();
        wired + usize::from(is_last) + usize::from(module.is_embedded())
    }

    fn check_source(&self, wire_id: WireId, source: &ModuleId) -> PipelineResult<()> {
        if self.model.contains(source) {
            Ok(())
        } else {
            Err(PipelineError::DanglingWire {
                wire_id,
                module_id: source.clone(),
            })
        }
    }
}
