//! Stage abstraction for the pipeline.
//!
//! A stage is the runtime form of a module: a lazy sequence of records.
//! Two modes share one topology:
//! - **[`Stage`]**: a pull-based iterator, driven synchronously.
//! - **[`AsyncStage`]**: a stream whose next record may be deferred.
//!
//! Collaborator modules provide stages through the [`StageFactory`] trait.
//! The [`StageKind`] trait lets the assembler treat both modes uniformly.

use crate::pipeline::conf::Conf;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::fanout::{Branch, Shared, Splitter};
use crate::pipeline::id::ModuleId;
use crate::pipeline::record::{self, Record, FOREVER_KEY};
use crate::pipeline::registry::StageRegistry;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Synchronous stage: pulls one record per `next`.
pub type Stage = Box<dyn Iterator<Item = PipelineResult<Record>> + Send>;

/// Asynchronous stage: producing the next record may suspend.
pub type AsyncStage = BoxStream<'static, PipelineResult<Record>>;

/// Operations the assembler needs from either stage mode.
pub trait StageKind: Sized + Send + 'static {
    /// The sentinel root: yields `{"forever": true}` without end.
    fn forever() -> Self;

    /// A stage yielding exactly one record.
    fn once(record: Record) -> Self;

    /// Tag production errors with the module id and record index.
    fn tagged(self, module_id: ModuleId) -> Self;

    fn from_branch(branch: Branch<Self>) -> Self;

    fn from_shared(shared: Shared<Self>) -> Self;
}

fn forever_record() -> PipelineResult<Record> {
    Ok(record::single(FOREVER_KEY, true))
}

fn tag(
    module_id: &ModuleId,
    index: usize,
    result: PipelineResult<Record>,
) -> PipelineResult<Record> {
    match result {
        Ok(record) => {
            trace!(module = %module_id, index, "Produced record");
            Ok(record)
        }
        Err(e) => Err(PipelineError::production(module_id, index, e)),
    }
}

impl StageKind for Stage {
    fn forever() -> Self {
        Box::new(std::iter::repeat_with(forever_record))
    }

    fn once(record: Record) -> Self {
        Box::new(std::iter::once(Ok(record)))
    }

    fn tagged(self, module_id: ModuleId) -> Self {
        Box::new(
            self.enumerate()
                .map(move |(index, result)| tag(&module_id, index, result)),
        )
    }

    fn from_branch(branch: Branch<Self>) -> Self {
        Box::new(branch)
    }

    fn from_shared(shared: Shared<Self>) -> Self {
        Box::new(shared)
    }
}

impl StageKind for AsyncStage {
    fn forever() -> Self {
        stream::repeat_with(forever_record).boxed()
    }

    fn once(record: Record) -> Self {
        stream::once(async move { Ok(record) }).boxed()
    }

    fn tagged(self, module_id: ModuleId) -> Self {
        self.enumerate()
            .map(move |(index, result)| tag(&module_id, index, result))
            .boxed()
    }

    fn from_branch(branch: Branch<Self>) -> Self {
        branch.boxed()
    }

    fn from_shared(shared: Shared<Self>) -> Self {
        shared.boxed()
    }
}

/// What a constructor produced for one module.
pub enum StageOutput<S> {
    /// A single stage, consumed by every downstream module.
    Stage(S),
    /// A fan-out; each downstream module attaches its own branch.
    Fanout(Splitter<S>),
}

/// Resolved constructor arguments, with upstream stages bound.
pub struct StageArgs<S> {
    pub module_id: ModuleId,
    pub context: Arc<ExecutionContext>,
    /// Primary input: an upstream stage, the sentinel root, or the
    /// per-invocation record of an embedded module.
    pub input: S,
    pub conf: Conf,
    /// Auxiliary named inputs.
    pub inputs: HashMap<String, S>,
    /// Embedded module of a loop.
    pub embed: Option<Arc<EmbedFactory>>,
    /// Fan-out count of a split.
    pub splits: Option<usize>,
    /// Registry of the run, for modules that assemble nested pipes.
    pub registry: Arc<StageRegistry>,
}

/// Constructor for the stages of one module type.
///
/// Both methods are called at most once per module per run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageFactory: Send + Sync {
    /// Build a synchronous stage.
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>>;

    /// Build an asynchronous stage. Construction itself may suspend.
    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>>;
}

/// Resolve a constructor's output into the stage a single consumer pulls.
pub fn single<S: StageKind>(output: StageOutput<S>) -> PipelineResult<S> {
    match output {
        StageOutput::Stage(stage) => Ok(stage),
        StageOutput::Fanout(splitter) => Ok(S::from_branch(splitter.attach()?)),
    }
}

/// A loop's embedded module, bound to its context and configuration but not
/// to an input. Each invocation builds a fresh stage over one record.
#[derive(Clone)]
pub struct EmbedFactory {
    pub module_id: ModuleId,
    pub module_type: String,
    factory: Arc<dyn StageFactory>,
    context: Arc<ExecutionContext>,
    conf: Conf,
    embed: Option<Arc<EmbedFactory>>,
    registry: Arc<StageRegistry>,
}

impl std::fmt::Debug for EmbedFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedFactory")
            .field("module_id", &self.module_id)
            .field("module_type", &self.module_type)
            .finish_non_exhaustive()
    }
}

impl EmbedFactory {
    pub fn new(
        module_id: ModuleId,
        module_type: String,
        factory: Arc<dyn StageFactory>,
        context: Arc<ExecutionContext>,
        conf: Conf,
        embed: Option<Arc<EmbedFactory>>,
        registry: Arc<StageRegistry>,
    ) -> Self {
        Self {
            module_id,
            module_type,
            factory,
            context,
            conf,
            embed,
            registry,
        }
    }

    fn args<S: StageKind>(&self, record: Record) -> StageArgs<S> {
        StageArgs {
            module_id: self.module_id.clone(),
            context: Arc::clone(&self.context),
            input: S::once(record),
            conf: self.conf.clone(),
            inputs: HashMap::new(),
            embed: self.embed.clone(),
            splits: None,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Build a stage over a single input record.
    pub fn invoke(&self, record: Record) -> PipelineResult<Stage> {
        let output = self
            .factory
            .build(self.args(record))
            .map_err(|e| PipelineError::construction(&self.module_id, e))?;
        Ok(single(output)?.tagged(self.module_id.clone()))
    }

    pub async fn invoke_async(&self, record: Record) -> PipelineResult<AsyncStage> {
        let output = self
            .factory
            .build_async(self.args(record))
            .await
            .map_err(|e| PipelineError::construction(&self.module_id, e))?;
        Ok(single(output)?.tagged(self.module_id.clone()))
    }
}

/// Per-record transformation for modules that map each input record to
/// exactly one output record.
pub trait RecordTransform: Send + Sync + 'static {
    /// Reject bad configuration before any record flows.
    fn validate(&self, _conf: &Conf) -> PipelineResult<()> {
        Ok(())
    }

    fn transform(&self, conf: &Conf, record: Record) -> PipelineResult<Record>;
}

/// [`StageFactory`] for a [`RecordTransform`].
pub struct MapFactory<T>(pub Arc<T>);

impl<T: RecordTransform> MapFactory<T> {
    pub fn new(transform: T) -> Self {
        Self(Arc::new(transform))
    }
}

#[async_trait]
impl<T: RecordTransform> StageFactory for MapFactory<T> {
    fn build(&self, args: StageArgs<Stage>) -> PipelineResult<StageOutput<Stage>> {
        self.0.validate(&args.conf)?;
        let transform = Arc::clone(&self.0);
        let conf = args.conf;
        Ok(StageOutput::Stage(Box::new(args.input.map(move |result| {
            result.and_then(|record| transform.transform(&conf, record))
        }))))
    }

    async fn build_async(
        &self,
        args: StageArgs<AsyncStage>,
    ) -> PipelineResult<StageOutput<AsyncStage>> {
        self.0.validate(&args.conf)?;
        let transform = Arc::clone(&self.0);
        let conf = args.conf;
        Ok(StageOutput::Stage(
            args.input
                .map(move |result| result.and_then(|record| transform.transform(&conf, record)))
                .boxed(),
        ))
    }
}
