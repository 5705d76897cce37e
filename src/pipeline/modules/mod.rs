//! Built-in module implementations.

pub mod count;
pub mod date_builder;
pub mod exchange_rate;
pub mod fetch;
pub mod loop_module;
pub mod output;
pub mod split;
pub mod subpipe;
pub mod user_input;

pub use count::CountFactory;
pub use date_builder::DateBuilder;
pub use exchange_rate::ExchangeRate;
pub use fetch::FetchFactory;
pub use loop_module::LoopFactory;
pub use output::OutputFactory;
pub use split::SplitFactory;
pub use subpipe::SubpipeFactory;
pub use user_input::UserInputFactory;

use crate::pipeline::error::PipelineResult;
use crate::pipeline::module_type::ModuleType;
use crate::pipeline::record::{self, Record};
use crate::pipeline::registry::StageRegistry;
use crate::pipeline::stage::{AsyncStage, MapFactory, Stage, StageFactory};
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;

/// Register every built-in module type.
pub fn register_builtins(registry: &mut StageRegistry) -> PipelineResult<()> {
    for &module_type in ModuleType::all() {
        registry.register(module_type.type_name(), factory_for(module_type))?;
    }
    Ok(())
}

fn factory_for(module_type: ModuleType) -> Arc<dyn StageFactory> {
    match module_type {
        ModuleType::Output => Arc::new(OutputFactory),
        ModuleType::Split => Arc::new(SplitFactory),
        ModuleType::Loop => Arc::new(LoopFactory),
        ModuleType::Count => Arc::new(CountFactory),
        ModuleType::Fetch => Arc::new(FetchFactory),
        ModuleType::TextInput
        | ModuleType::NumberInput
        | ModuleType::UrlInput
        | ModuleType::PrivateInput => Arc::new(UserInputFactory::new(module_type)),
        ModuleType::DateBuilder => Arc::new(MapFactory::new(DateBuilder)),
        ModuleType::ExchangeRate => Arc::new(MapFactory::new(ExchangeRate)),
    }
}

fn flatten(batch: PipelineResult<Vec<Record>>) -> Vec<PipelineResult<Record>> {
    match batch {
        Ok(records) => records.into_iter().map(Ok).collect(),
        Err(e) => vec![Err(e)],
    }
}

/// Produce a batch of records per input record.
///
/// A record from the sentinel root is processed once and ends the stage,
/// so modules fed by nothing run exactly once.
pub(crate) fn per_item<F>(mut input: Stage, mut f: F) -> Stage
where
    F: FnMut(Record) -> PipelineResult<Vec<Record>> + Send + 'static,
{
    let mut done = false;
    let batches = std::iter::from_fn(move || {
        if done {
            return None;
        }
        let item = match input.next()? {
            Ok(item) => item,
            Err(e) => return Some(Err(e)),
        };
        done = record::is_forever(&item);
        Some(f(item))
    });
    Box::new(batches.flat_map(flatten))
}

/// Asynchronous counterpart of [`per_item`]: each batch may suspend.
pub(crate) fn per_item_async<F, Fut>(input: AsyncStage, f: F) -> AsyncStage
where
    F: FnMut(Record) -> Fut + Send + 'static,
    Fut: Future<Output = PipelineResult<Vec<Record>>> + Send + 'static,
{
    stream::unfold(Some((input, f)), |state| async move {
        let (mut input, mut f) = state?;
        let item = match input.next().await? {
            Ok(item) => item,
            Err(e) => return Some((Err(e), Some((input, f)))),
        };
        let last = record::is_forever(&item);
        let batch = f(item).await;
        Some((batch, (!last).then_some((input, f))))
    })
    .flat_map(|batch| stream::iter(flatten(batch)))
    .boxed()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::pipeline::conf::Conf;
    use crate::pipeline::context::ExecutionContext;
    use crate::pipeline::id::ModuleId;
    use crate::pipeline::record::Record;
    use crate::pipeline::registry::StageRegistry;
    use crate::pipeline::stage::{AsyncStage, Stage, StageArgs, StageKind};
    use futures_util::stream::{self, StreamExt};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;

    pub fn records(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap_or_default())
            .collect()
    }

    pub fn args(input: Vec<Record>, conf: Value) -> StageArgs<Stage> {
        let input: Stage = Box::new(input.into_iter().map(Ok));
        args_with(input, conf)
    }

    pub fn forever_args(conf: Value) -> StageArgs<Stage> {
        args_with(Stage::forever(), conf)
    }

    pub fn async_args(input: Vec<Record>, conf: Value) -> StageArgs<AsyncStage> {
        args_with(stream::iter(input.into_iter().map(Ok)).boxed(), conf)
    }

    pub fn args_with<S>(input: S, conf: Value) -> StageArgs<S> {
        StageArgs {
            module_id: ModuleId::from_raw("m"),
            context: Arc::new(ExecutionContext::test_mode()),
            input,
            conf: Conf::from_value(&conf),
            inputs: HashMap::new(),
            embed: None,
            splits: None,
            registry: Arc::new(StageRegistry::new()),
        }
    }
}
