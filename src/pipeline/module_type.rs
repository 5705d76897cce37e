//! Module type enumeration for the built-in stage constructors.
//!
//! Module types travel through the graph description as plain strings; the
//! registry is keyed by those strings so collaborator crates can add their
//! own. This enum names the types this crate ships.

use serde::{Deserialize, Serialize};

/// Type name of the loop construct, which owns an embedded module.
pub const LOOP: &str = "loop";

/// Type name of the fan-out construct.
pub const SPLIT: &str = "split";

/// Prefix of sub-pipeline module types (`pipe:<name>`).
pub const SUBPIPE_PREFIX: &str = "pipe:";

/// Built-in module types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Output,
    Split,
    Loop,
    Count,
    Fetch,
    TextInput,
    NumberInput,
    UrlInput,
    PrivateInput,
    DateBuilder,
    ExchangeRate,
}

impl ModuleType {
    /// Type string as it appears in graph descriptions.
    pub fn type_name(&self) -> &'static str {
        match self {
            ModuleType::Output => "output",
            ModuleType::Split => SPLIT,
            ModuleType::Loop => LOOP,
            ModuleType::Count => "count",
            ModuleType::Fetch => "fetch",
            ModuleType::TextInput => "textinput",
            ModuleType::NumberInput => "numberinput",
            ModuleType::UrlInput => "urlinput",
            ModuleType::PrivateInput => "privateinput",
            ModuleType::DateBuilder => "datebuilder",
            ModuleType::ExchangeRate => "exchangerate",
        }
    }

    /// Get all built-in module types.
    pub fn all() -> &'static [ModuleType] {
        &[
            ModuleType::Output,
            ModuleType::Split,
            ModuleType::Loop,
            ModuleType::Count,
            ModuleType::Fetch,
            ModuleType::TextInput,
            ModuleType::NumberInput,
            ModuleType::UrlInput,
            ModuleType::PrivateInput,
            ModuleType::DateBuilder,
            ModuleType::ExchangeRate,
        ]
    }
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Name a module type is listed under in dependency descriptions and call
/// forms: `pipe` + type (`pipefetch`), or the normalized sub-pipeline type.
pub fn pipe_name(module_type: &str) -> String {
    if module_type.starts_with(SUBPIPE_PREFIX) {
        crate::pipeline::id::normalize(module_type)
    } else {
        format!("pipe{module_type}")
    }
}
