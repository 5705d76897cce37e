//! pipegraph - Main Entry Point
//!
//! Compiles a pipe description and prints its plan, its description or the
//! records it produces (one JSON object per line).

use anyhow::{Context, Result};
use clap::Parser;
use pipegraph_rs::{
    cli::Cli,
    config::EngineConfig,
    pipeline::{
        compile, Description, ExecutionContext, PipeGraph, PipelineExecutor, RunOutput,
        StageRegistry,
    },
};
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default_path()
            .map(EngineConfig::load_or_default)
            .unwrap_or_default(),
    };

    // Records go to stdout, logs to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let content = std::fs::read_to_string(&cli.pipe)
        .with_context(|| format!("Failed to read pipe {:?}", cli.pipe))?;
    let description: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse pipe {:?}", cli.pipe))?;
    let graph = compile(&description, &cli.pipe_name())?;

    if cli.plan {
        let mut stdout = std::io::stdout().lock();
        for step in &graph.plan().steps {
            writeln!(stdout, "{step}")?;
        }
        return Ok(());
    }

    let context = execution_context(&cli, &config);
    let registry = Arc::new(StageRegistry::with_builtins()?);
    let executor =
        PipelineExecutor::new(registry).with_record_timeout(config.runtime.record_timeout());
    let limit = cli.limit.unwrap_or(usize::MAX);

    if cli.async_mode || config.runtime.async_mode {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        runtime.block_on(run_async(&executor, context, &graph, limit))
    } else {
        run(&executor, context, &graph, limit)
    }
}

fn execution_context(cli: &Cli, config: &EngineConfig) -> ExecutionContext {
    let mut context = config.execution_context();
    context.test |= cli.test;
    context.verbose |= cli.verbose;
    context.describe_input = cli.describe_input;
    context.describe_dependencies = cli.describe_dependencies;
    for (name, value) in &cli.inputs {
        context = context.with_input(name.clone(), value.clone());
    }
    context
}

fn print_description(description: &Description) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(description)?);
    Ok(())
}

fn run(
    executor: &PipelineExecutor,
    context: ExecutionContext,
    graph: &PipeGraph,
    limit: usize,
) -> Result<()> {
    let output = match executor.run(context, graph)? {
        RunOutput::Description(description) => return print_description(&description),
        RunOutput::Records(output) => output,
    };

    let mut stdout = std::io::stdout().lock();
    for record in output.take(limit) {
        writeln!(stdout, "{}", serde_json::to_string(&record?)?)?;
    }
    Ok(())
}

async fn run_async(
    executor: &PipelineExecutor,
    context: ExecutionContext,
    graph: &PipeGraph,
    limit: usize,
) -> Result<()> {
    let mut output = match executor.run_async(context, graph).await? {
        RunOutput::Description(description) => return print_description(&description),
        RunOutput::Records(output) => output,
    };

    let mut printed = 0;
    while printed < limit {
        let Some(record) = output.next().await else {
            break;
        };
        println!("{}", serde_json::to_string(&record?)?);
        printed += 1;
    }
    tracing::info!(records = printed, "Pipe finished");
    Ok(())
}
