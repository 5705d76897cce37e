//! Stage factories for exercising the engine from outside the crate

use async_trait::async_trait;
use futures_util::StreamExt;
use pipegraph_rs::pipeline::{
    AsyncStage, PipelineResult, Record, Stage, StageArgs, StageFactory, StageOutput,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Passthrough stage that counts how often it is constructed
#[derive(Default, Clone)]
pub struct CountingFactory {
    pub builds: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageFactory for CountingFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(StageOutput::Stage(args.input))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(StageOutput::Stage(args.input))
    }
}

/// Overwrites `field` on every record in place
pub struct MutateFactory {
    pub field: &'static str,
    pub value: Value,
}

fn mutate(field: &str, value: &Value, mut record: Record) -> Record {
    record.insert(field.to_string(), value.clone());
    record
}

#[async_trait]
impl StageFactory for MutateFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        let (field, value) = (self.field, self.value.clone());
        Ok(StageOutput::Stage(Box::new(
            args.input
                .map(move |r| r.map(|record| mutate(field, &value, record))),
        )))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        let (field, value) = (self.field, self.value.clone());
        Ok(StageOutput::Stage(
            args.input
                .map(move |r| r.map(|record| mutate(field, &value, record)))
                .boxed(),
        ))
    }
}

/// Pairs its default input with the named input `other`:
/// `{"main": <default record>, "other": <other record>}`
pub struct MergeFactory;

fn pair(main: PipelineResult<Record>, other: PipelineResult<Record>) -> PipelineResult<Record> {
    let (main, other) = (main?, other?);
    Ok(json!({"main": main, "other": other})
        .as_object()
        .cloned()
        .unwrap_or_default())
}

#[async_trait]
impl StageFactory for MergeFactory {
    fn build(&self, mut args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        let other = args.inputs.remove("other").unwrap_or_else(|| Box::new(std::iter::empty()));
        Ok(StageOutput::Stage(Box::new(
            args.input.zip(other).map(|(main, other)| pair(main, other)),
        )))
    }

    async fn build_async(
        &self,
        mut args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        let other = args
            .inputs
            .remove("other")
            .unwrap_or_else(|| futures_util::stream::empty().boxed());
        Ok(StageOutput::Stage(
            args.input
                .zip(other)
                .map(|(main, other)| pair(main, other))
                .boxed(),
        ))
    }
}
