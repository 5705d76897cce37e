//! Static pipe metadata, derived from the graph without building stages.

use crate::pipeline::conf::Conf;
use crate::pipeline::graph::PipeGraph;
use crate::pipeline::module_type::pipe_name;
use crate::pipeline::record::value_text;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// An externally provided input declared by a user-input module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDescriptor {
    pub position: i64,
    pub name: String,
    pub prompt: String,
    /// Declared type of the default value.
    pub kind: Option<String>,
    pub default: Value,
}

impl InputDescriptor {
    /// Read a descriptor from a module configuration. Modules missing any of
    /// `position`, `name` or `prompt` declare no input.
    pub fn from_conf(conf: &Conf) -> Option<Self> {
        let position = conf.literal("position")?;
        let name = conf.literal("name")?;
        let prompt = conf.literal("prompt")?;
        let default = conf.raw("default");

        Some(Self {
            position: position
                .as_i64()
                .or_else(|| position.as_str().and_then(|s| s.trim().parse().ok()))
                .unwrap_or_default(),
            name: value_text(name),
            prompt: value_text(prompt),
            kind: default
                .and_then(|d| d.get("type"))
                .and_then(Value::as_str)
                .map(str::to_string),
            default: conf.literal("default").cloned().unwrap_or(Value::Null),
        })
    }

    fn sort_key(&self) -> (i64, &str, &str) {
        (self.position, &self.name, &self.prompt)
    }
}

/// Metadata returned by a describe-only run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Description {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<InputDescriptor>>,
}

/// Sorted, de-duplicated module type names used by the pipe, embedded
/// modules included, in `pipe<type>` form.
pub fn dependencies(graph: &PipeGraph) -> Vec<String> {
    graph
        .modules()
        .map(|module| pipe_name(&module.module_type))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Declared external inputs of the top-level modules, sorted by position.
pub fn inputs(graph: &PipeGraph) -> Vec<InputDescriptor> {
    let mut inputs: Vec<_> = graph
        .modules()
        .filter(|module| !module.is_embedded())
        .filter_map(|module| InputDescriptor::from_conf(&module.conf))
        .collect();
    inputs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compiler::compile;
    use serde_json::json;

    #[test]
    fn test_dependencies_sorted_unique() {
        let graph = compile(
            &json!({
                "modules": [
                    {"id": "a", "type": "split"},
                    {"id": "b", "type": "fetch"},
                    {"id": "c", "type": "fetch"},
                    {"id": "l", "type": "loop", "conf": {
                        "embed": {"value": {"id": "e", "type": "datebuilder"}}
                    }}
                ]
            }),
            "deps",
        )
        .unwrap();
        assert_eq!(
            dependencies(&graph),
            ["pipedatebuilder", "pipefetch", "pipeloop", "pipesplit"]
        );
    }

    #[test]
    fn test_inputs_sorted_by_position() {
        let input = |id: &str, position: &str, name: &str| {
            json!({"id": id, "type": "textinput", "conf": {
                "position": {"value": position},
                "name": {"value": name},
                "prompt": {"value": format!("{name}?")},
                "default": {"type": "text", "value": "x"}
            }})
        };
        let graph = compile(
            &json!({
                "modules": [
                    input("i2", "2", "second"),
                    input("i1", "1", "first"),
                    {"id": "f", "type": "fetch"}
                ]
            }),
            "inputs",
        )
        .unwrap();

        let described = inputs(&graph);
        let names: Vec<_> = described.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(described[0].kind.as_deref(), Some("text"));
        assert_eq!(described[0].default, json!("x"));
    }
}
