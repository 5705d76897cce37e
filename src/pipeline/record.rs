//! Records: the unit of data flowing between stages.
//!
//! A record is a string-keyed JSON object. Cloning a record is a deep copy,
//! which is what the split stage relies on to isolate its branches.

use serde_json::{Map, Value};

/// A single record produced by a stage.
pub type Record = Map<String, Value>;

/// Field the sentinel root stage sets on every record it produces.
pub const FOREVER_KEY: &str = "forever";

/// Build a record holding a single field.
pub fn single(key: impl Into<String>, value: impl Into<Value>) -> Record {
    let mut record = Record::new();
    record.insert(key.into(), value.into());
    record
}

/// Whether a record was produced by the sentinel root rather than a real source.
pub fn is_forever(record: &Record) -> bool {
    record.contains_key(FOREVER_KEY)
}

/// Look up a possibly dotted path (`author.name`) in a record.
///
/// A literal key containing dots wins over the nested interpretation.
pub fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }

    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Render a value as text the way configuration coercion expects it:
/// strings unquoted, everything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
