//! Pipeline executor: drives the final stage of an assembled pipe.
//!
//! ```text
//! compile ─► PipeGraph ─► run(context) ─┬─► describe-only ─► Description
//!                                       └─► assemble ─► output stage ─► records
//! ```
//!
//! Running never mutates the graph; each run assembles fresh stages.

use crate::pipeline::assembler::Assembler;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::describe::{self, Description};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::PipeGraph;
use crate::pipeline::id::ModuleId;
use crate::pipeline::record::Record;
use crate::pipeline::registry::StageRegistry;
use crate::pipeline::stage::{AsyncStage, Stage};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Result of a run: either the pipe's records or its static description.
pub enum RunOutput<O> {
    Records(O),
    Description(Description),
}

impl<O> RunOutput<O> {
    pub fn into_records(self) -> Option<O> {
        match self {
            RunOutput::Records(records) => Some(records),
            RunOutput::Description(_) => None,
        }
    }

    pub fn into_description(self) -> Option<Description> {
        match self {
            RunOutput::Records(_) => None,
            RunOutput::Description(description) => Some(description),
        }
    }
}

/// Records of a synchronous run. Pulling drives the whole pipe lazily;
/// dropping it early stops every upstream stage.
pub struct PipelineOutput {
    module_id: ModuleId,
    stage: Stage,
}

impl PipelineOutput {
    /// Module whose stage produces the output.
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }
}

impl Iterator for PipelineOutput {
    type Item = PipelineResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stage.next()
    }
}

/// Records of an asynchronous run.
///
/// [`next`](Self::next) is the single resumption point of the run; the
/// optional record timeout is enforced here.
pub struct AsyncPipelineOutput {
    module_id: ModuleId,
    stage: AsyncStage,
    timeout: Option<Duration>,
    produced: usize,
    finished: bool,
}

impl AsyncPipelineOutput {
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// Await the next record.
    pub async fn next(&mut self) -> Option<PipelineResult<Record>> {
        if self.finished {
            return None;
        }
        let index = self.produced;
        let next = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.stage.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::warn!(module = %self.module_id, index, "Record production timed out");
                    return Some(Err(PipelineError::Timeout {
                        module_id: self.module_id.clone(),
                        index,
                    }));
                }
            },
            None => self.stage.next().await,
        };

        match next {
            Some(_) => self.produced += 1,
            None => self.finished = true,
        }
        next
    }

    /// Pull every remaining record, stopping at the first error.
    pub async fn collect_all(mut self) -> PipelineResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await {
            records.push(record?);
        }
        Ok(records)
    }

    /// Pull at most `limit` records, stopping at the first error.
    pub async fn take(&mut self, limit: usize) -> PipelineResult<Vec<Record>> {
        let mut records = Vec::with_capacity(limit);
        while records.len() < limit {
            match self.next().await {
                Some(record) => records.push(record?),
                None => break,
            }
        }
        Ok(records)
    }

    /// The raw output stream, without timeout enforcement.
    pub fn into_stream(self) -> AsyncStage {
        self.stage
    }
}

/// Runs compiled pipes against a stage registry.
pub struct PipelineExecutor {
    registry: Arc<StageRegistry>,
    record_timeout: Option<Duration>,
}

impl PipelineExecutor {
    pub fn new(registry: Arc<StageRegistry>) -> Self {
        Self {
            registry,
            record_timeout: None,
        }
    }

    /// Bound the time an asynchronous run may spend on any one record.
    pub fn with_record_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.record_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<StageRegistry> {
        &self.registry
    }

    /// Run in synchronous pull mode.
    pub fn run(
        &self,
        context: ExecutionContext,
        graph: &PipeGraph,
    ) -> PipelineResult<RunOutput<PipelineOutput>> {
        if let Some(description) = describe_only(&context, graph) {
            return Ok(RunOutput::Description(description));
        }

        tracing::info!(pipe = %graph.name(), "Running pipe");
        let context = Arc::new(context);
        let pipeline =
            Assembler::new(graph, Arc::clone(&self.registry), context).assemble()?;
        let module_id = pipeline.output_id().clone();
        let stage = pipeline.into_output()?;

        Ok(RunOutput::Records(PipelineOutput { module_id, stage }))
    }

    /// Run in cooperative asynchronous mode.
    pub async fn run_async(
        &self,
        context: ExecutionContext,
        graph: &PipeGraph,
    ) -> PipelineResult<RunOutput<AsyncPipelineOutput>> {
        if let Some(description) = describe_only(&context, graph) {
            return Ok(RunOutput::Description(description));
        }

        tracing::info!(pipe = %graph.name(), "Running pipe asynchronously");
        let context = Arc::new(context);
        let pipeline = Assembler::new(graph, Arc::clone(&self.registry), context)
            .assemble_async()
            .await?;
        let module_id = pipeline.output_id().clone();
        let stage = pipeline.into_output()?;

        Ok(RunOutput::Records(AsyncPipelineOutput {
            module_id,
            stage,
            timeout: self.record_timeout,
            produced: 0,
            finished: false,
        }))
    }
}

fn describe_only(context: &ExecutionContext, graph: &PipeGraph) -> Option<Description> {
    if !context.describe_only() {
        return None;
    }
    tracing::debug!(pipe = %graph.name(), "Describing pipe without running it");
    Some(Description {
        dependencies: context
            .describe_dependencies
            .then(|| describe::dependencies(graph)),
        inputs: context.describe_input.then(|| describe::inputs(graph)),
    })
}
