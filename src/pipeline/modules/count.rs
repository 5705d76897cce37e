//! Count module: a single record tallying its input.
//!
//! Fed by nothing, the count is zero.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::record::{self, Record};
use crate::pipeline::stage::{AsyncStage, Stage, StageArgs, StageFactory, StageOutput};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

/// Field holding the tally.
pub const COUNT_KEY: &str = "count";

pub struct CountFactory;

#[async_trait]
impl StageFactory for CountFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        let input = args.input;
        let tally = std::iter::once_with(move || -> PipelineResult<Record> {
            let mut count = 0u64;
            for item in input {
                if record::is_forever(&item?) {
                    break;
                }
                count += 1;
            }
            Ok(record::single(COUNT_KEY, count))
        });
        Ok(StageOutput::Stage(Box::new(tally)))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        let mut input = args.input;
        let tally = stream::once(async move {
            let mut count = 0u64;
            while let Some(item) = input.next().await {
                if record::is_forever(&item?) {
                    break;
                }
                count += 1;
            }
            Ok::<_, PipelineError>(record::single(COUNT_KEY, count))
        });
        Ok(StageOutput::Stage(tally.boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::modules::test_support::{args, async_args, forever_args, records};
    use crate::pipeline::stage::single;
    use serde_json::json;

    #[test]
    fn test_count() {
        let input = records(vec![json!({}), json!({}), json!({})]);
        let mut stage = single(CountFactory.build(args(input, json!({}))).unwrap()).unwrap();
        assert_eq!(stage.next().unwrap().unwrap()[COUNT_KEY], json!(3));
        assert!(stage.next().is_none());
    }

    #[test]
    fn test_count_without_input() {
        let mut stage = single(CountFactory.build(forever_args(json!({}))).unwrap()).unwrap();
        assert_eq!(stage.next().unwrap().unwrap()[COUNT_KEY], json!(0));
    }

    #[tokio::test]
    async fn test_count_async() {
        let input = records(vec![json!({}), json!({})]);
        let stage = single(CountFactory.build_async(async_args(input, json!({}))).await.unwrap())
            .unwrap();
        let out: Vec<_> = stage.collect().await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap()[COUNT_KEY], json!(2));
    }
}
