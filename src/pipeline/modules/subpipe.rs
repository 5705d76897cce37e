//! Sub-pipeline module: a compiled pipe used as a single stage.
//!
//! The sub-pipe runs with its own context: test and verbose flags are
//! inherited, its user inputs come from the literal values of the module's
//! conf. The parent's default input is not consumed.

use crate::pipeline::assembler::Assembler;
use crate::pipeline::conf::Conf;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::graph::PipeGraph;
use crate::pipeline::stage::{AsyncStage, Stage, StageArgs, StageFactory, StageOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct SubpipeFactory {
    graph: Arc<PipeGraph>,
}

impl SubpipeFactory {
    pub fn new(graph: PipeGraph) -> Self {
        Self {
            graph: Arc::new(graph),
        }
    }

    pub fn graph(&self) -> &PipeGraph {
        &self.graph
    }

    fn context(&self, parent: &ExecutionContext, conf: &Conf) -> Arc<ExecutionContext> {
        let inputs: HashMap<String, Value> = conf
            .as_map()
            .keys()
            .filter_map(|name| Some((name.clone(), conf.literal(name)?.clone())))
            .collect();
        tracing::debug!(pipe = %self.graph.name(), inputs = inputs.len(), "Entering sub-pipe");
        Arc::new(parent.for_submodule(inputs))
    }
}

#[async_trait]
impl StageFactory for SubpipeFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        let context = self.context(&args.context, &args.conf);
        let pipeline = Assembler::new(&self.graph, args.registry, context).assemble()?;
        Ok(StageOutput::Stage(pipeline.into_output()?))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        let context = self.context(&args.context, &args.conf);
        let pipeline = Assembler::new(&self.graph, args.registry, context)
            .assemble_async()
            .await?;
        Ok(StageOutput::Stage(pipeline.into_output()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compiler::compile;
    use crate::pipeline::modules::test_support::{args_with, forever_args};
    use crate::pipeline::registry::StageRegistry;
    use crate::pipeline::stage::{single, StageKind};
    use futures_util::StreamExt;
    use serde_json::json;

    fn greeting() -> PipeGraph {
        compile(
            &json!({
                "modules": [
                    {"id": "who", "type": "textinput", "conf": {
                        "name": {"value": "who"}, "default": {"value": "world"}
                    }},
                    {"id": "out", "type": "output"}
                ],
                "wires": {"id": "w", "src": {"moduleid": "who", "id": "_OUTPUT"},
                          "tgt": {"moduleid": "out", "id": "_INPUT"}}
            }),
            "greeting",
        )
        .unwrap()
    }

    fn registry() -> Arc<StageRegistry> {
        let mut registry = StageRegistry::with_builtins().unwrap();
        registry.register_pipe("greeting", greeting()).unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_conf_literals_become_inputs() {
        let mut args = forever_args(json!({"who": {"value": "rust"}}));
        args.registry = registry();
        let factory = args.registry.get("pipe:greeting").unwrap();
        let mut stage = single(factory.build(args).unwrap()).unwrap();
        assert_eq!(stage.next().unwrap().unwrap()["content"], json!("rust"));
    }

    #[test]
    fn test_missing_input_uses_default() {
        let mut args = forever_args(json!({}));
        args.registry = registry();
        let mut stage = single(SubpipeFactory::new(greeting()).build(args).unwrap()).unwrap();
        assert_eq!(stage.next().unwrap().unwrap()["content"], json!("world"));
    }

    #[tokio::test]
    async fn test_async_subpipe() {
        let mut args = args_with(AsyncStage::forever(), json!({"who": "async"}));
        args.registry = registry();
        let factory = SubpipeFactory::new(greeting());
        let stage = single(factory.build_async(args).await.unwrap()).unwrap();
        let first: Vec<_> = stage.take(2).collect().await;
        assert_eq!(first[1].as_ref().unwrap()["content"], json!("async"));
    }
}
