//! Split module: copies its input to every outgoing branch.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::fanout::Splitter;
use crate::pipeline::stage::{AsyncStage, Stage, StageArgs, StageFactory, StageOutput};
use crate::pipeline::wiring::DEFAULT_SPLITS;
use async_trait::async_trait;

pub struct SplitFactory;

fn fanout<S>(args: StageArgs<S>) -> StageOutput<S> {
    let splits = args.splits.unwrap_or(DEFAULT_SPLITS);
    tracing::debug!(module = %args.module_id, splits, "Splitting input");
    StageOutput::Fanout(Splitter::new(args.module_id, args.input, splits))
}

#[async_trait]
impl StageFactory for SplitFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        Ok(fanout(args))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        Ok(fanout(args))
    }
}
