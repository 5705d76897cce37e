//! Per-run execution parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Cross-cutting parameters of one run.
///
/// Created once per run and shared read-only by every stage of that run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionContext {
    /// Never prompt; user inputs fall back to their defaults.
    pub test: bool,
    /// Log every resolved step in call form.
    pub verbose: bool,
    /// Return the declared user inputs instead of running.
    pub describe_input: bool,
    /// Return the module type dependencies instead of running.
    pub describe_dependencies: bool,
    /// Running as a sub-pipeline of another pipe.
    pub submodule: bool,
    /// Values for user-input modules, keyed by input name.
    pub inputs: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test_mode() -> Self {
        Self {
            test: true,
            ..Self::default()
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Whether the run should only describe the pipe.
    pub fn describe_only(&self) -> bool {
        self.describe_input || self.describe_dependencies
    }

    /// Context for a sub-pipeline invoked from this run.
    pub fn for_submodule(&self, inputs: HashMap<String, Value>) -> Self {
        Self {
            test: self.test,
            verbose: self.verbose,
            describe_input: false,
            describe_dependencies: false,
            submodule: true,
            inputs,
        }
    }

    /// User inputs are taken from `inputs` (falling back to defaults)
    /// instead of being prompted for.
    pub fn uses_supplied_inputs(&self) -> bool {
        self.submodule || !self.inputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_only() {
        let mut ctx = ExecutionContext::new();
        assert!(!ctx.describe_only());
        ctx.describe_input = true;
        assert!(ctx.describe_only());
    }

    #[test]
    fn test_submodule_context() {
        let ctx = ExecutionContext::test_mode().with_input("a", 1);
        let sub = ctx.for_submodule(HashMap::from([("b".to_string(), Value::from(2))]));
        assert!(sub.submodule);
        assert!(sub.test);
        assert!(sub.uses_supplied_inputs());
        assert_eq!(sub.inputs.get("b"), Some(&Value::from(2)));
        assert!(!sub.inputs.contains_key("a"));
        assert!(!ExecutionContext::new().uses_supplied_inputs());
    }
}
