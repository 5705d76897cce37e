//! Loop module: runs its embedded module once per input record.
//!
//! In `assign` mode the embedded results are stored on the input record
//! under `assign_to`; in `EMIT` mode the embedded records replace it.

use crate::pipeline::conf::{Conf, FieldSpec};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::modules::{per_item, per_item_async};
use crate::pipeline::record::Record;
use crate::pipeline::stage::{AsyncStage, EmbedFactory, Stage, StageArgs, StageFactory, StageOutput};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde_json::Value;
use std::sync::Arc;

const MODE: FieldSpec = FieldSpec::text("mode").or("assign");
const ASSIGN_TO: FieldSpec = FieldSpec::text("assign_to").or("loop");
const ASSIGN_PART: FieldSpec = FieldSpec::text("assign_part").or("all");
const EMIT_PART: FieldSpec = FieldSpec::text("emit_part").or("all");

pub struct LoopFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    All,
    First,
}

impl Part {
    fn parse(conf: &Conf, spec: &FieldSpec) -> PipelineResult<Self> {
        match conf.text(spec, None)?.as_str() {
            "all" => Ok(Part::All),
            "first" => Ok(Part::First),
            other => Err(PipelineError::invalid_config(
                spec.name,
                format!("expected 'all' or 'first', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoopMode {
    Assign { to: String, part: Part },
    Emit { part: Part },
}

impl LoopMode {
    fn from_conf(conf: &Conf) -> PipelineResult<Self> {
        if conf.text(&MODE, None)?.eq_ignore_ascii_case("emit") {
            return Ok(LoopMode::Emit {
                part: Part::parse(conf, &EMIT_PART)?,
            });
        }
        Ok(LoopMode::Assign {
            to: conf.text(&ASSIGN_TO, None)?,
            part: Part::parse(conf, &ASSIGN_PART)?,
        })
    }

    /// Combine an input record with the embedded module's results for it.
    fn apply(&self, mut item: Record, results: Vec<Record>) -> Vec<Record> {
        match self {
            LoopMode::Emit { part: Part::All } => results,
            LoopMode::Emit { part: Part::First } => results.into_iter().take(1).collect(),
            LoopMode::Assign { to, part } => {
                let value = match part {
                    Part::All => Value::Array(results.into_iter().map(Value::Object).collect()),
                    Part::First => results
                        .into_iter()
                        .next()
                        .map(Value::Object)
                        .unwrap_or(Value::Null),
                };
                item.insert(to.clone(), value);
                vec![item]
            }
        }
    }
}

fn embed_of<S>(args: &StageArgs<S>) -> PipelineResult<Arc<EmbedFactory>> {
    args.embed
        .clone()
        .ok_or_else(|| PipelineError::invalid_config("embed", "loop has no embedded module"))
}

#[async_trait]
impl StageFactory for LoopFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        let embed = embed_of(&args)?;
        let mode = LoopMode::from_conf(&args.conf)?;
        tracing::debug!(module = %args.module_id, embed = %embed.module_id, ?mode, "Looping");

        Ok(StageOutput::Stage(per_item(args.input, move |item| {
            let results = embed
                .invoke(item.clone())?
                .collect::<PipelineResult<Vec<_>>>()?;
            Ok(mode.apply(item, results))
        })))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        let embed = embed_of(&args)?;
        let mode = Arc::new(LoopMode::from_conf(&args.conf)?);
        tracing::debug!(module = %args.module_id, embed = %embed.module_id, ?mode, "Looping");

        Ok(StageOutput::Stage(per_item_async(args.input, move |item| {
            let embed = Arc::clone(&embed);
            let mode = Arc::clone(&mode);
            async move {
                let results: Vec<Record> = embed
                    .invoke_async(item.clone())
                    .await?
                    .try_collect()
                    .await?;
                Ok::<_, PipelineError>(mode.apply(item, results))
            }
        })))
    }
}
