//! # pipegraph-rs: pipe-graph compiler and lazy execution engine
//!
//! Turns a declarative, graph-shaped description of a data pipeline (modules
//! connected by wires, with loop modules embedding sub-modules) into a chain
//! of lazy stages, and drives it to produce records.
//!
//! ## Architecture
//!
//! - **Compiler**: parses the description, orders modules by dependency and
//!   resolves each module's inputs into an [`pipeline::ExecutionPlan`]
//! - **Registry**: maps module type names to [`pipeline::StageFactory`]
//!   implementations, built-in or registered sub-pipes
//! - **Executor**: assembles the plan into stages per run, synchronous
//!   (iterator) or cooperative asynchronous (tokio stream)
//! - **Configuration**: TOML engine config under `dev.pipegraph`
//!
//! ## Configuration
//!
//! The engine config is read from the platform config directory:
//!
//! - **Linux**: `~/.config/dev.pipegraph/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.pipegraph/config.toml`
//! - **Windows**: `%APPDATA%\dev.pipegraph\config.toml`
//!
//! ## Example
//!
//! ```ignore
//! use pipegraph_rs::pipeline::{compile, ExecutionContext, PipelineExecutor, StageRegistry};
//! use std::sync::Arc;
//!
//! let graph = compile(&serde_json::from_str(&description)?, "feed")?;
//! let executor = PipelineExecutor::new(Arc::new(StageRegistry::with_builtins()?));
//!
//! if let Some(records) = executor.run(ExecutionContext::test_mode(), &graph)?.into_records() {
//!     for record in records.take(10) {
//!         println!("{}", serde_json::to_string(&record?)?);
//!     }
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{PipegraphError, Result, ResultExt};
pub use pipeline::{
    compile, ExecutionContext, PipeGraph, PipelineError, PipelineExecutor, PipelineResult, Record,
    StageRegistry,
};
