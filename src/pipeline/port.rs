//! Terminal naming for module ports.
//!
//! `_INPUT` is a module's primary input slot; any terminal starting with
//! `_OUTPUT` (`_OUTPUT`, `_OUTPUT2`, ...) is an output slot. Every other
//! terminal name on the target side of a wire is an auxiliary named input.

/// Name of the primary input terminal.
pub const INPUT: &str = "_INPUT";

/// Prefix shared by all output terminals.
pub const OUTPUT_PREFIX: &str = "_OUTPUT";

/// A terminal on a module, as named in the graph description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Terminal(String);

impl Terminal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The primary input slot.
    pub fn is_default_input(&self) -> bool {
        self.0 == INPUT
    }

    /// A primary or secondary output slot.
    pub fn is_output(&self) -> bool {
        self.0.starts_with(OUTPUT_PREFIX)
    }
}
