//! Test data builders for pipe descriptions

use pipegraph_rs::pipeline::{compile, PipeGraph, PipelineResult};
use serde_json::{json, Value};

/// Builder for pipe descriptions in the `modules` / `wires` format
#[derive(Default)]
pub struct PipeBuilder {
    modules: Vec<Value>,
    wires: Vec<Value>,
}

impl PipeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, id: &str, module_type: &str, conf: Value) -> Self {
        self.modules
            .push(json!({"id": id, "type": module_type, "conf": conf}));
        self
    }

    /// Wire `src._OUTPUT` to `tgt._INPUT`
    pub fn wire(self, src: &str, tgt: &str) -> Self {
        self.wire_terminals(src, "_OUTPUT", tgt, "_INPUT")
    }

    /// Wire `src._OUTPUT` to an auxiliary terminal of `tgt`
    pub fn wire_to(self, src: &str, tgt: &str, terminal: &str) -> Self {
        self.wire_terminals(src, "_OUTPUT", tgt, terminal)
    }

    pub fn wire_terminals(mut self, src: &str, src_id: &str, tgt: &str, tgt_id: &str) -> Self {
        let id = format!("_w{}", self.wires.len() + 1);
        self.wires.push(json!({
            "id": id,
            "src": {"moduleid": src, "id": src_id},
            "tgt": {"moduleid": tgt, "id": tgt_id}
        }));
        self
    }

    pub fn build(self) -> Value {
        json!({"modules": self.modules, "wires": self.wires})
    }

    pub fn compile(self, name: &str) -> PipelineResult<PipeGraph> {
        compile(&self.build(), name)
    }
}

/// Conf pointing a fetch module at a local source
pub fn fetch_conf(path: &std::path::Path) -> Value {
    json!({"URL": {"value": format!("file://{}", path.display())}})
}

/// Conf of a loop embedding one module
pub fn loop_conf(embed_id: &str, embed_type: &str, embed_conf: Value, extra: Value) -> Value {
    let mut conf = json!({
        "embed": {"value": {"id": embed_id, "type": embed_type, "conf": embed_conf}}
    });
    if let (Some(conf), Value::Object(extra)) = (conf.as_object_mut(), extra) {
        conf.extend(extra);
    }
    conf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_builder() {
        let description = PipeBuilder::new()
            .module("a", "fetch", json!({}))
            .module("b", "output", json!({}))
            .wire("a", "b")
            .build();

        assert_eq!(description["modules"].as_array().unwrap().len(), 2);
        assert_eq!(description["wires"][0]["tgt"]["id"], json!("_INPUT"));
    }
}
