//! Graph model: the parsed, normalized form of a pipe description.
//!
//! ```text
//! {
//!   "modules": [ {"id": .., "type": .., "conf": {..}}, .. ],
//!   "wires":   [ {"id": .., "src": {"moduleid": .., "id": ..},
//!                           "tgt": {"moduleid": .., "id": ..}}, .. ]
//! }
//! ```
//!
//! `modules` and `wires` may also be a single object instead of a list.
//! Modules of type `loop` carry an embedded module under `conf.embed.value`;
//! it is registered as a graph node of its own, right after its parent.

use crate::pipeline::compiled_plan::ExecutionPlan;
use crate::pipeline::conf::Conf;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{normalize, ModuleId, WireId};
use crate::pipeline::module_type::LOOP;
use crate::pipeline::port::Terminal;
use serde_json::Value;
use std::collections::HashMap;

/// A module of the graph, top-level or embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub id: ModuleId,
    /// The id as it appeared in the description.
    pub raw_id: String,
    pub module_type: String,
    pub conf: Conf,
    /// Owning loop module, for embedded modules.
    pub parent: Option<ModuleId>,
}

impl Module {
    pub fn is_embedded(&self) -> bool {
        self.parent.is_some()
    }

    /// Id of the embedded module this loop owns.
    pub fn embed_id(&self) -> Option<ModuleId> {
        if self.module_type != LOOP {
            return None;
        }
        self.conf
            .raw("embed")
            .and_then(|embed| embed.get("value"))
            .and_then(|value| value.get("id"))
            .and_then(Value::as_str)
            .map(ModuleId::from_raw)
    }
}

/// One end of a wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub module_id: ModuleId,
    pub terminal: Terminal,
}

/// A directed connection between two module terminals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    pub id: WireId,
    pub source: Endpoint,
    pub target: Endpoint,
}

impl Wire {
    /// Wire feeding `module`'s primary input from an output terminal.
    pub fn is_default_input_of(&self, module: &ModuleId) -> bool {
        &self.target.module_id == module
            && self.target.terminal.is_default_input()
            && self.source.terminal.is_output()
    }

    /// Wire feeding one of `module`'s auxiliary named inputs.
    pub fn is_named_input_of(&self, module: &ModuleId) -> bool {
        &self.target.module_id == module
            && !self.target.terminal.is_default_input()
            && self.source.terminal.is_output()
    }
}

/// Parsed description before dependency analysis.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    pub name: String,
    /// All modules in insertion order; embedded ones follow their parent.
    pub modules: Vec<Module>,
    pub wires: Vec<Wire>,
    index: HashMap<ModuleId, usize>,
}

impl GraphModel {
    /// Parse a raw description.
    pub fn parse(description: &Value, name: &str) -> PipelineResult<Self> {
        let root = description
            .as_object()
            .ok_or_else(|| PipelineError::malformed("/", "description must be an object"))?;

        let mut model = GraphModel {
            name: normalize(name),
            ..Default::default()
        };

        let modules = root
            .get("modules")
            .ok_or_else(|| PipelineError::malformed("/modules", "missing field"))?;
        for (i, raw) in listize(modules).into_iter().enumerate() {
            model.add_module(raw, &format!("/modules/{i}"), None)?;
        }

        if let Some(wires) = root.get("wires") {
            for (i, raw) in listize(wires).into_iter().enumerate() {
                let wire = parse_wire(raw, &format!("/wires/{i}"))?;
                model.wires.push(wire);
            }
        }

        Ok(model)
    }

    fn add_module(
        &mut self,
        raw: &Value,
        path: &str,
        parent: Option<&ModuleId>,
    ) -> PipelineResult<()> {
        let object = raw
            .as_object()
            .ok_or_else(|| PipelineError::malformed(path, "module must be an object"))?;
        let raw_id = required_str(object.get("id"), &format!("{path}/id"))?;
        let module_type = required_str(object.get("type"), &format!("{path}/type"))?;
        let conf = object.get("conf").map(Conf::from_value).unwrap_or_default();

        let id = ModuleId::from_raw(raw_id);
        if let Some(&existing) = self.index.get(&id) {
            return Err(PipelineError::malformed(
                format!("{path}/id"),
                format!(
                    "module id '{}' collides with '{}' after normalization",
                    raw_id, self.modules[existing].raw_id
                ),
            ));
        }

        let module = Module {
            id: id.clone(),
            raw_id: raw_id.to_string(),
            module_type: module_type.to_string(),
            conf,
            parent: parent.cloned(),
        };
        self.index.insert(id.clone(), self.modules.len());
        self.modules.push(module);

        if module_type == LOOP {
            let embed_path = format!("{path}/conf/embed/value");
            let embed = object
                .get("conf")
                .and_then(|conf| conf.get("embed"))
                .and_then(|embed| embed.get("value"))
                .ok_or_else(|| PipelineError::malformed(&embed_path, "loop without embedded module"))?;
            self.add_module(embed, &embed_path, Some(&id))?;
        }

        Ok(())
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.index.get(id).map(|&i| &self.modules[i])
    }

    /// Insertion position of a module; the topological tie-break key.
    pub fn position(&self, id: &ModuleId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.index.contains_key(id)
    }
}

fn listize(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

fn required_str<'a>(value: Option<&'a Value>, path: &str) -> PipelineResult<&'a str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) => Err(PipelineError::malformed(path, "must not be empty")),
        Some(_) => Err(PipelineError::malformed(path, "must be a string")),
        None => Err(PipelineError::malformed(path, "missing field")),
    }
}

fn parse_endpoint(value: Option<&Value>, path: &str) -> PipelineResult<Endpoint> {
    let object = value
        .and_then(Value::as_object)
        .ok_or_else(|| PipelineError::malformed(path, "missing endpoint"))?;
    let module = required_str(object.get("moduleid"), &format!("{path}/moduleid"))?;
    let terminal = required_str(object.get("id"), &format!("{path}/id"))?;
    Ok(Endpoint {
        module_id: ModuleId::from_raw(module),
        terminal: Terminal::new(terminal),
    })
}

fn parse_wire(raw: &Value, path: &str) -> PipelineResult<Wire> {
    let object = raw
        .as_object()
        .ok_or_else(|| PipelineError::malformed(path, "wire must be an object"))?;
    let id = required_str(object.get("id"), &format!("{path}/id"))?;
    Ok(Wire {
        id: WireId::from_raw(id),
        source: parse_endpoint(object.get("src"), &format!("{path}/src"))?,
        target: parse_endpoint(object.get("tgt"), &format!("{path}/tgt"))?,
    })
}

/// Compiled, immutable pipe graph.
///
/// Holds the normalized model, the pruned dependency graph, the topological
/// order and the resolved wiring of every executable module. The same graph
/// can be run any number of times.
#[derive(Debug, Clone)]
pub struct PipeGraph {
    pub(crate) model: GraphModel,
    /// Pruned adjacency: module -> modules that depend on it.
    pub(crate) adjacency: Vec<(ModuleId, Vec<ModuleId>)>,
    pub(crate) order: Vec<ModuleId>,
    pub(crate) plan: ExecutionPlan,
}

impl PipeGraph {
    pub fn name(&self) -> &str {
        &self.model.name
    }

    /// Every module, pruned or not, in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.model.modules.iter()
    }

    /// Embedded (loop body) modules.
    pub fn embedded(&self) -> impl Iterator<Item = &Module> {
        self.model.modules.iter().filter(|m| m.is_embedded())
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.model.module(id)
    }

    pub fn wires(&self) -> &[Wire] {
        &self.model.wires
    }

    /// Dependency edges after orphan pruning.
    pub fn adjacency(&self) -> &[(ModuleId, Vec<ModuleId>)] {
        &self.adjacency
    }

    /// Whether a module survived orphan pruning.
    pub fn is_connected(&self, id: &ModuleId) -> bool {
        self.adjacency.iter().any(|(node, _)| node == id)
    }

    /// Topological order of the executable modules.
    pub fn order(&self) -> &[ModuleId] {
        &self.order
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }
}
