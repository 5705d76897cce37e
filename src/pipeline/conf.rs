//! Typed module configuration.
//!
//! A module's `conf` is a JSON object of field descriptors. A descriptor is
//! either a bare scalar or an object `{"type": .., "value": .., "subkey": ..}`
//! where `subkey` binds the field to a key of the record being processed.
//!
//! Modules read their configuration through [`FieldSpec`]s, which fix the
//! kind, default and coercion of each field. Resolution follows one rule:
//!
//! 1. item-bound value (`subkey` present and the current record holds it)
//! 2. literal `value`
//! 3. the field's declared default, then the kind's zero value
//!
//! The kind declared by the `FieldSpec` wins over any `type` declared inside the
//! descriptor.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::record::{self, Record};
use serde_json::{Map, Value};

/// Kind of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Integer,
    Text,
    Bool,
}

impl FieldKind {
    pub fn zero(self) -> Value {
        match self {
            FieldKind::Number => Value::from(0.0),
            FieldKind::Integer => Value::from(0),
            FieldKind::Text => Value::from(""),
            FieldKind::Bool => Value::from(false),
        }
    }

    /// Coerce a raw value into this kind.
    pub fn coerce(self, field: &str, value: &Value) -> PipelineResult<Value> {
        let invalid = |what: &str| {
            PipelineError::invalid_config(field, format!("cannot read {value} as {what}"))
        };

        match self {
            FieldKind::Text => Ok(Value::from(record::value_text(value))),
            FieldKind::Number => match value {
                Value::Number(n) => n.as_f64().map(Value::from).ok_or_else(|| invalid("number")),
                Value::Bool(b) => Ok(Value::from(if *b { 1.0 } else { 0.0 })),
                Value::String(s) if s.trim().is_empty() => Ok(self.zero()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|_| invalid("number")),
                _ => Err(invalid("number")),
            },
            FieldKind::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .map(Value::from)
                    .ok_or_else(|| invalid("integer")),
                Value::Bool(b) => Ok(Value::from(i64::from(*b))),
                Value::String(s) if s.trim().is_empty() => Ok(self.zero()),
                Value::String(s) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .or_else(|_| s.parse::<f64>().map(|f| f as i64))
                        .map(Value::from)
                        .map_err(|_| invalid("integer"))
                }
                _ => Err(invalid("integer")),
            },
            FieldKind::Bool => match value {
                Value::Bool(b) => Ok(Value::from(*b)),
                Value::Number(n) => Ok(Value::from(n.as_f64().is_some_and(|f| f != 0.0))),
                Value::Null => Ok(self.zero()),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "" | "0" | "false" | "no" => Ok(Value::from(false)),
                    "1" | "true" | "yes" => Ok(Value::from(true)),
                    _ => Err(invalid("bool")),
                },
                _ => Err(invalid("bool")),
            },
        }
    }
}

/// Schema entry for one configuration field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: Option<&'static str>,
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Text, default: None }
    }

    pub const fn number(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Number, default: None }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Integer, default: None }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Bool, default: None }
    }

    pub const fn or(self, default: &'static str) -> Self {
        Self { default: Some(default), ..self }
    }

    fn default_value(&self) -> PipelineResult<Value> {
        match self.default {
            Some(default) => self.kind.coerce(self.name, &Value::from(default)),
            None => Ok(self.kind.zero()),
        }
    }
}

/// A module's configuration mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conf(Map<String, Value>);

impl Conf {
    /// Anything that isn't a JSON object yields an empty configuration.
    pub fn from_value(value: &Value) -> Self {
        Self(value.as_object().cloned().unwrap_or_default())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Literal `value` of a descriptor, without coercion.
    pub fn literal(&self, name: &str) -> Option<&Value> {
        match self.0.get(name)? {
            Value::Object(descriptor) => descriptor.get("value").filter(|v| !v.is_null()),
            Value::Null => None,
            scalar => Some(scalar),
        }
    }

    /// Resolve a field for an optional record, applying the precedence rule.
    pub fn resolve(&self, spec: &FieldSpec, item: Option<&Record>) -> PipelineResult<Value> {
        if let Some(Value::Object(descriptor)) = self.0.get(spec.name) {
            let bound = descriptor
                .get("subkey")
                .and_then(Value::as_str)
                .zip(item)
                .and_then(|(key, item)| record::lookup(item, key));
            if let Some(bound) = bound {
                return spec.kind.coerce(spec.name, bound);
            }
        }

        match self.literal(spec.name) {
            Some(literal) => spec.kind.coerce(spec.name, literal),
            None => spec.default_value(),
        }
    }

    pub fn text(&self, spec: &FieldSpec, item: Option<&Record>) -> PipelineResult<String> {
        Ok(record::value_text(&self.resolve(spec, item)?))
    }

    pub fn number(&self, spec: &FieldSpec, item: Option<&Record>) -> PipelineResult<f64> {
        Ok(self.resolve(spec, item)?.as_f64().unwrap_or_default())
    }

    pub fn integer(&self, spec: &FieldSpec, item: Option<&Record>) -> PipelineResult<i64> {
        Ok(self.resolve(spec, item)?.as_i64().unwrap_or_default())
    }

    pub fn boolean(&self, spec: &FieldSpec, item: Option<&Record>) -> PipelineResult<bool> {
        Ok(self.resolve(spec, item)?.as_bool().unwrap_or_default())
    }

    /// Text field that must be present and non-empty.
    pub fn required_text(&self, spec: &FieldSpec, item: Option<&Record>) -> PipelineResult<String> {
        let value = self.text(spec, item)?;
        if value.is_empty() {
            return Err(PipelineError::invalid_config(spec.name, "missing required value"));
        }
        Ok(value)
    }
}
