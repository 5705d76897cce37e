//! User-input modules: a value supplied from outside the pipe, yielded forever.
//!
//! The value is resolved once, when the stage is built:
//! 1. supplied inputs of the context (sub-pipes, or any run given inputs),
//!    falling back to the default
//! 2. an interactive prompt on stdin, outside test mode
//! 3. the default (`default`, or `debug` when `default` is empty)

use crate::pipeline::conf::{Conf, FieldKind, FieldSpec};
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::module_type::ModuleType;
use crate::pipeline::record;
use crate::pipeline::stage::{AsyncStage, Stage, StageArgs, StageFactory, StageOutput};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::io::{BufRead, Write};

const NAME: FieldSpec = FieldSpec::text("name");
const PROMPT: FieldSpec = FieldSpec::text("prompt");
const DEFAULT: FieldSpec = FieldSpec::text("default");
const DEBUG: FieldSpec = FieldSpec::text("debug");

/// Field holding the input value in every produced record.
pub const CONTENT_KEY: &str = "content";

pub struct UserInputFactory {
    module_type: ModuleType,
}

/// What to ask and what to fall back to.
struct InputRequest {
    name: String,
    prompt: String,
    default: String,
}

impl InputRequest {
    fn from_conf(conf: &Conf) -> PipelineResult<Self> {
        let default = match conf.text(&DEFAULT, None)? {
            d if d.is_empty() => conf.text(&DEBUG, None)?,
            d => d,
        };
        Ok(Self {
            name: conf.text(&NAME, None)?,
            prompt: conf.text(&PROMPT, None)?,
            default,
        })
    }

    /// Value from the context, if the run doesn't prompt.
    fn supplied(&self, context: &ExecutionContext) -> Option<Value> {
        if context.uses_supplied_inputs() {
            Some(
                context
                    .inputs
                    .get(&self.name)
                    .cloned()
                    .unwrap_or_else(|| Value::from(self.default.clone())),
            )
        } else if context.test {
            Some(Value::from(self.default.clone()))
        } else {
            None
        }
    }

    fn prompt_stdin(&self) -> PipelineResult<Value> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{} (default={}) ", self.prompt, self.default)?;
        stderr.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        let answer = line.trim();
        Ok(Value::from(if answer.is_empty() {
            self.default.clone()
        } else {
            answer.to_string()
        }))
    }
}

impl UserInputFactory {
    pub fn new(module_type: ModuleType) -> Self {
        Self { module_type }
    }

    fn kind(&self) -> FieldKind {
        match self.module_type {
            ModuleType::NumberInput => FieldKind::Number,
            _ => FieldKind::Text,
        }
    }

    fn finish(&self, request: &InputRequest, value: Value) -> PipelineResult<Value> {
        tracing::debug!(input = %request.name, "Resolved user input");
        self.kind().coerce(&request.name, &value)
    }
}

#[async_trait]
impl StageFactory for UserInputFactory {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        let request = InputRequest::from_conf(&args.conf)?;
        let value = match request.supplied(&args.context) {
            Some(value) => value,
            None => request.prompt_stdin()?,
        };
        let output = record::single(CONTENT_KEY, self.finish(&request, value)?);
        Ok(StageOutput::Stage(Box::new(std::iter::repeat_with(
            move || Ok(output.clone()),
        ))))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        let mut request = InputRequest::from_conf(&args.conf)?;
        let value = match request.supplied(&args.context) {
            Some(value) => value,
            None => {
                let (returned, value) = tokio::task::spawn_blocking(move || {
                    let value = request.prompt_stdin();
                    (request, value)
                })
                .await
                .map_err(|e| PipelineError::Module(format!("prompt task failed: {e}")))?;
                request = returned;
                value?
            }
        };

        let output = record::single(CONTENT_KEY, self.finish(&request, value)?);
        Ok(StageOutput::Stage(
            stream::repeat_with(move || Ok(output.clone())).boxed(),
        ))
    }
}
