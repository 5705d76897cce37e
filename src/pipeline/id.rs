//! Identity types for the pipeline system.
//!
//! Externally supplied module and wire ids can contain any character. They are
//! normalized once, by the graph builder, into identifier-safe form and then
//! wrapped in newtypes so the two id spaces can't be mixed up.

use std::fmt;

/// Characters that are replaced with `_` during normalization.
const REPLACED: [char; 3] = ['-', ':', '/'];

/// Normalize an external id into identifier form.
///
/// `-`, `:` and `/` become `_`, and ids starting with a digit get a `_`
/// prefix. The transformation is deterministic; collisions between two
/// distinct raw ids are detected by the graph builder.
pub fn normalize(raw: &str) -> String {
    let mut id: String = raw
        .chars()
        .map(|c| if REPLACED.contains(&c) { '_' } else { c })
        .collect();

    if id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert(0, '_');
    }

    id
}

/// Normalized id of a module (top-level or embedded).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    /// Build an id from an external (raw) module id.
    pub fn from_raw(raw: &str) -> Self {
        Self(normalize(raw))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

/// Normalized id of a wire.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(String);

impl WireId {
    pub fn from_raw(raw: &str) -> Self {
        Self(normalize(raw))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireId({})", self.0)
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_replaces_separators() {
        assert_eq!(normalize("sw-502"), "sw_502");
        assert_eq!(normalize("pipe:abc/def"), "pipe_abc_def");
    }

    #[test]
    fn test_normalize_leading_digit() {
        assert_eq!(normalize("3cd"), "_3cd");
        assert_eq!(normalize("_OUTPUT"), "_OUTPUT");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = "_w-1:2/3";
        assert_eq!(normalize(raw), normalize(raw));
    }

    #[test]
    fn test_module_id_display() {
        let id = ModuleId::from_raw("sw-1");
        assert_eq!(id.to_string(), "sw_1");
        assert_eq!(format!("{:?}", id), "ModuleId(sw_1)");
    }

    #[test]
    fn test_wire_id() {
        let id = WireId::from_raw("_w1");
        assert_eq!(id.as_str(), "_w1");
    }
}
