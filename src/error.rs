//! Error handling for the pipegraph application layer
//!
//! Pipeline errors live in [`crate::pipeline::error`]; this module wraps them
//! together with configuration and IO failures of the binary.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for pipegraph operations outside the core engine
#[derive(Error, Debug)]
pub enum PipegraphError {
    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors raised while compiling or running a pipe
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipegraphError>,
    },
}

impl PipegraphError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipegraphError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for PipegraphError {
    fn from(err: serde_json::Error) -> Self {
        PipegraphError::Serialization(err.to_string())
    }
}

/// Result type alias for pipegraph operations
pub type Result<T> = std::result::Result<T, PipegraphError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
