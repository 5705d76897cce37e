//! Pipeline-specific error types.
//!
//! Compile-time kinds (`MalformedGraph` through `StageConstruction`) are eager
//! and abort the compile or assembly that raised them. `RecordProduction` and
//! `Timeout` are lazy: they surface from the pull that triggered them.

use crate::pipeline::id::{ModuleId, WireId};
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed graph at {path}: {message}")]
    MalformedGraph { path: String, message: String },

    #[error("Cycle detected in pipeline graph, unresolved modules: {}", join_ids(.nodes))]
    CyclicGraph { nodes: Vec<ModuleId> },

    #[error("Wire {wire_id} references unknown module {module_id}")]
    DanglingWire { wire_id: WireId, module_id: ModuleId },

    #[error("No stage constructor registered for module type '{0}'")]
    UnknownModuleType(String),

    #[error("Stage constructor for module type '{0}' is already registered")]
    DuplicateModuleType(String),

    #[error("Failed to construct stage for module {module_id}: {source}")]
    StageConstruction {
        module_id: ModuleId,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Module {module_id} failed producing record #{index}: {source}")]
    RecordProduction {
        module_id: ModuleId,
        index: usize,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Split {module_id} has {splits} outputs, tried to activate another")]
    SplitOveractivation { module_id: ModuleId, splits: usize },

    #[error("Invalid configuration field '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    #[error("{0}")]
    Module(String),

    #[error("Module {module_id} timed out producing record #{index}")]
    Timeout { module_id: ModuleId, index: usize },

    #[error("Pipeline has no executable modules")]
    EmptyPipeline,

    #[error("Stage for module {module_id} was already consumed")]
    StageConsumed { module_id: ModuleId },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::MalformedGraph {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a constructor failure with the id of the module being built.
    pub fn construction(module_id: &ModuleId, source: PipelineError) -> Self {
        match source {
            already @ PipelineError::StageConstruction { .. } => already,
            other => PipelineError::StageConstruction {
                module_id: module_id.clone(),
                source: Box::new(other),
            },
        }
    }

    /// Tag a production failure with the producing module and record index.
    ///
    /// Errors that were already tagged by an upstream stage pass through
    /// unchanged so the report names the stage that actually failed.
    pub fn production(module_id: &ModuleId, index: usize, source: PipelineError) -> Self {
        match source {
            tagged @ (PipelineError::RecordProduction { .. } | PipelineError::Timeout { .. }) => {
                tagged
            }
            other => PipelineError::RecordProduction {
                module_id: module_id.clone(),
                index,
                source: Box::new(other),
            },
        }
    }

    /// Module id the error is attributed to, if any.
    pub fn module_id(&self) -> Option<&ModuleId> {
        match self {
            PipelineError::DanglingWire { module_id, .. }
            | PipelineError::StageConstruction { module_id, .. }
            | PipelineError::RecordProduction { module_id, .. }
            | PipelineError::SplitOveractivation { module_id, .. }
            | PipelineError::Timeout { module_id, .. }
            | PipelineError::StageConsumed { module_id } => Some(module_id),
            _ => None,
        }
    }
}

fn join_ids(ids: &[ModuleId]) -> String {
    ids.iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
