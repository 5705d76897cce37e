//! Pipeline assembly: instantiate one stage per plan step, in order.

use crate::pipeline::compiled_plan::{InputSource, PlanStep};
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::fanout::{Shared, Splitter};
use crate::pipeline::graph::PipeGraph;
use crate::pipeline::id::ModuleId;
use crate::pipeline::registry::StageRegistry;
use crate::pipeline::stage::{
    AsyncStage, EmbedFactory, Stage, StageArgs, StageFactory, StageKind, StageOutput,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Where a module's stage lives until its consumers take it.
enum StageSlot<S> {
    /// Single consumer; taken exactly once.
    Owned(Option<S>),
    /// Several consumers pulling from the same stage.
    Shared(Shared<S>),
    /// Split output; each consumer attaches a branch.
    Fanout(Splitter<S>),
}

/// The live stages of one run, keyed by module id.
pub struct CompiledPipeline<S> {
    stages: HashMap<ModuleId, StageSlot<S>>,
    embeds: HashMap<ModuleId, Arc<EmbedFactory>>,
    output: ModuleId,
}

impl<S: StageKind> CompiledPipeline<S> {
    fn new(output: ModuleId) -> Self {
        Self {
            stages: HashMap::new(),
            embeds: HashMap::new(),
            output,
        }
    }

    /// Hand out the stage of `id` to one consumer.
    fn take(&mut self, id: &ModuleId) -> PipelineResult<S> {
        match self.stages.get_mut(id) {
            Some(StageSlot::Owned(slot)) => slot.take().ok_or_else(|| PipelineError::StageConsumed {
                module_id: id.clone(),
            }),
            Some(StageSlot::Shared(shared)) => Ok(S::from_shared(shared.clone())),
            Some(StageSlot::Fanout(splitter)) => Ok(S::from_branch(splitter.attach()?)),
            None => Err(PipelineError::malformed(
                format!("/modules/{id}"),
                "stage referenced before it was assembled",
            )),
        }
    }

    fn embed(&self, id: &ModuleId) -> PipelineResult<Arc<EmbedFactory>> {
        self.embeds.get(id).cloned().ok_or_else(|| {
            PipelineError::malformed(format!("/modules/{id}"), "embedded module not bound")
        })
    }

    fn install(&mut self, step: &PlanStep, output: StageOutput<S>) {
        let id = step.module_id.clone();
        let slot = match output {
            StageOutput::Stage(stage) => {
                let stage = stage.tagged(id.clone());
                if step.consumers > 1 {
                    StageSlot::Shared(Shared::new(id.clone(), stage))
                } else {
                    StageSlot::Owned(Some(stage))
                }
            }
            StageOutput::Fanout(splitter) => StageSlot::Fanout(splitter),
        };
        self.stages.insert(id, slot);
    }

    /// Number of modules instantiated (stages plus bound embeds).
    pub fn instantiated(&self) -> usize {
        self.stages.len() + self.embeds.len()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.stages.contains_key(id) || self.embeds.contains_key(id)
    }

    pub fn output_id(&self) -> &ModuleId {
        &self.output
    }

    /// Take the final module's stage, releasing everything else.
    pub fn into_output(mut self) -> PipelineResult<S> {
        let output = self.output.clone();
        let stage = self.take(&output)?;

        for (id, slot) in &self.stages {
            if let StageSlot::Fanout(splitter) = slot {
                let unused = splitter.seal()?;
                if unused > 0 {
                    tracing::warn!(module = %id, unused, "Split has unconsumed branches");
                }
            }
        }

        Ok(stage)
    }
}

/// Builds a [`CompiledPipeline`] from a compiled graph.
///
/// Every call produces fresh stages bound to the given context; nothing is
/// shared between runs.
pub struct Assembler<'a> {
    graph: &'a PipeGraph,
    registry: Arc<StageRegistry>,
    context: Arc<ExecutionContext>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        graph: &'a PipeGraph,
        registry: Arc<StageRegistry>,
        context: Arc<ExecutionContext>,
    ) -> Self {
        Self {
            graph,
            registry,
            context,
        }
    }

    fn output_id(&self) -> PipelineResult<ModuleId> {
        self.graph
            .plan()
            .last()
            .map(|step| step.module_id.clone())
            .ok_or(PipelineError::EmptyPipeline)
    }

    /// Assemble synchronous stages.
    pub fn assemble(&self) -> PipelineResult<CompiledPipeline<Stage>> {
        let mut pipeline = CompiledPipeline::new(self.output_id()?);

        for step in &self.graph.plan().steps {
            let factory = self.registry.get(&step.module_type)?;
            if step.embedded {
                self.bind_embed(step, factory, &mut pipeline)?;
                continue;
            }

            let args = self.args(step, &mut pipeline)?;
            self.log_step(step);
            let output = factory
                .build(args)
                .map_err(|e| PipelineError::construction(&step.module_id, e))?;
            pipeline.install(step, output);
        }

        tracing::info!(
            pipe = %self.graph.name(),
            modules = pipeline.instantiated(),
            "Assembled pipeline"
        );
        Ok(pipeline)
    }

    /// Assemble asynchronous stages. Constructors may suspend.
    pub async fn assemble_async(&self) -> PipelineResult<CompiledPipeline<AsyncStage>> {
        let mut pipeline = CompiledPipeline::new(self.output_id()?);

        for step in &self.graph.plan().steps {
            let factory = self.registry.get(&step.module_type)?;
            if step.embedded {
                self.bind_embed(step, factory, &mut pipeline)?;
                continue;
            }

            let args = self.args(step, &mut pipeline)?;
            self.log_step(step);
            let output = factory
                .build_async(args)
                .await
                .map_err(|e| PipelineError::construction(&step.module_id, e))?;
            pipeline.install(step, output);
        }

        tracing::info!(
            pipe = %self.graph.name(),
            modules = pipeline.instantiated(),
            "Assembled async pipeline"
        );
        Ok(pipeline)
    }

    fn log_step(&self, step: &PlanStep) {
        if self.context.verbose {
            tracing::info!("{}", step);
        } else {
            tracing::debug!(module = %step.module_id, "Building {}", step.module_type);
        }
    }

    fn args<S: StageKind>(
        &self,
        step: &PlanStep,
        pipeline: &mut CompiledPipeline<S>,
    ) -> PipelineResult<StageArgs<S>> {
        let input = match &step.args.input {
            InputSource::Forever => S::forever(),
            InputSource::Module(source) => pipeline.take(source)?,
            InputSource::Runtime => {
                return Err(PipelineError::malformed(
                    format!("/modules/{}", step.module_id),
                    "runtime input outside a loop",
                ))
            }
        };

        let inputs = step
            .args
            .inputs
            .iter()
            .map(|(name, source)| Ok((name.clone(), pipeline.take(source)?)))
            .collect::<PipelineResult<HashMap<_, _>>>()?;

        let embed = step
            .args
            .embed
            .as_ref()
            .map(|id| pipeline.embed(id))
            .transpose()?;

        Ok(StageArgs {
            module_id: step.module_id.clone(),
            context: Arc::clone(&self.context),
            input,
            conf: step.args.conf.clone(),
            inputs,
            embed,
            splits: step.args.splits,
            registry: Arc::clone(&self.registry),
        })
    }

    /// Embedded modules are bound, not built: the loop invokes them per record.
    fn bind_embed<S: StageKind>(
        &self,
        step: &PlanStep,
        factory: Arc<dyn StageFactory>,
        pipeline: &mut CompiledPipeline<S>,
    ) -> PipelineResult<()> {
        let nested = step
            .args
            .embed
            .as_ref()
            .map(|id| pipeline.embed(id))
            .transpose()?;

        tracing::debug!(module = %step.module_id, "Binding embedded {}", step.module_type);
        let bound = EmbedFactory::new(
            step.module_id.clone(),
            step.module_type.clone(),
            factory,
            Arc::clone(&self.context),
            step.args.conf.clone(),
            nested,
            Arc::clone(&self.registry),
        );
        pipeline.embeds.insert(step.module_id.clone(), Arc::new(bound));
        Ok(())
    }
}
