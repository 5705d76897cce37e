//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use pipegraph_rs::pipeline::{
    ExecutionContext, PipeGraph, PipelineExecutor, Record, StageRegistry,
};
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Registry holding every built-in module type
pub fn builtin_registry() -> StageRegistry {
    StageRegistry::with_builtins().expect("built-in module types register once")
}

pub fn executor() -> PipelineExecutor {
    PipelineExecutor::new(Arc::new(builtin_registry()))
}

/// Write a fetch source holding `document` to a temporary file
pub fn fetch_source(document: &Value) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp source");
    write!(file, "{document}").expect("write temp source");
    file
}

/// Run `graph` synchronously in test mode and collect every record
pub fn run_to_end(executor: &PipelineExecutor, graph: &PipeGraph) -> Vec<Record> {
    executor
        .run(ExecutionContext::test_mode(), graph)
        .expect("pipe runs")
        .into_records()
        .expect("records, not a description")
        .map(|record| record.expect("record produced"))
        .collect()
}
