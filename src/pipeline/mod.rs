//! Pipe-graph compiler and execution engine.
//!
//! A pipe description (modules, wires, loop embeds) is compiled once into a
//! [`PipeGraph`], then run any number of times. Each run assembles fresh,
//! lazy stages and drives the last one, either synchronously or on tokio.
//!
//! # Architecture
//!
//! ```text
//! description ──► GraphModel ──► adjacency ──► prune ──► topological order
//!                                                              │
//!                                        WiringResolver ◄──────┘
//!                                              │
//!                                        ExecutionPlan
//!                                              │
//!                 StageRegistry ──► Assembler ─┴─► output stage ──► records
//! ```
//!
//! # Design
//!
//! - **Compile once, run many**: `PipeGraph` is immutable; runs never share stages.
//! - **Lazy stages**: nothing is produced until the output is pulled.
//! - **One topology, two modes**: `Stage` (iterator) and `AsyncStage` (stream)
//!   are assembled by the same code through the `StageKind` trait.
//! - **Collaborators behind a trait**: module behaviour lives in `StageFactory`
//!   implementations looked up by type name.

pub mod assembler;
pub mod compiled_plan;
pub mod compiler;
pub mod conf;
pub mod context;
pub mod describe;
pub mod error;
pub mod executor;
pub mod fanout;
pub mod graph;
pub mod id;
pub mod module_type;
pub mod modules;
pub mod port;
pub mod record;
pub mod registry;
pub mod stage;
pub mod wiring;

pub use assembler::{Assembler, CompiledPipeline};
pub use compiled_plan::{ExecutionPlan, InputSource, PlanStats, PlanStep, ResolvedArgs};
pub use compiler::{compile, PipelineCompiler};
pub use conf::{Conf, FieldKind, FieldSpec};
pub use context::ExecutionContext;
pub use describe::{Description, InputDescriptor};
pub use error::{PipelineError, PipelineResult};
pub use executor::{AsyncPipelineOutput, PipelineExecutor, PipelineOutput, RunOutput};
pub use graph::{GraphModel, Module, PipeGraph, Wire};
pub use id::{ModuleId, WireId};
pub use module_type::ModuleType;
pub use record::Record;
pub use registry::StageRegistry;
pub use stage::{
    AsyncStage, EmbedFactory, MapFactory, RecordTransform, Stage, StageArgs, StageFactory,
    StageKind, StageOutput,
};
