//! Output module: the pipe's result, passed through unchanged.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::stage::{AsyncStage, Stage, StageArgs, StageFactory, StageOutput};
use async_trait::async_trait;

pub struct OutputFactory;

#[async_trait]
impl StageFactory for OutputFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        Ok(StageOutput::Stage(args.input))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        Ok(StageOutput::Stage(args.input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::modules::test_support::{args, records};
    use crate::pipeline::stage::single;
    use serde_json::json;

    #[test]
    fn test_passthrough() {
        let input = records(vec![json!({"a": 1}), json!({"a": 2})]);
        let stage = single(OutputFactory.build(args(input.clone(), json!({}))).unwrap()).unwrap();
        let out: Vec<_> = stage.map(Result::unwrap).collect();
        assert_eq!(out, input);
    }
}
