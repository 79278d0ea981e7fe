//! In-progress structures shared by the backends.
use crate::error::JoinError;
use serde_json::{Map, Value};

/// An object or array being filled by `append`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ValueFrame {
    Object {
        map: Map<String, Value>,
        pending_key: Option<String>,
    },
    Array(Vec<Value>),
}

impl ValueFrame {
    pub fn object(seed: Map<String, Value>) -> Self {
        ValueFrame::Object {
            map: seed,
            pending_key: None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ValueFrame::Object { .. })
    }

    /// Arrays push; objects store under the pending key or shallow-merge another object.
    pub fn append(&mut self, value: Value) -> Result<(), JoinError> {
        match self {
            ValueFrame::Array(items) => {
                items.push(value);
                Ok(())
            }
            ValueFrame::Object { map, pending_key } => match (pending_key.take(), value) {
                (Some(key), value) => {
                    map.insert(key, value);
                    Ok(())
                }
                (None, Value::Object(other)) => {
                    map.extend(other);
                    Ok(())
                }
                (None, other) => Err(JoinError::MissingPropertyKey(format!(
                    "cannot add {} to an object without a property name",
                    other
                ))),
            },
        }
    }

    pub fn set_key(&mut self, key: &str) -> Result<(), JoinError> {
        match self {
            ValueFrame::Object { pending_key, .. } => {
                *pending_key = Some(key.to_string());
                Ok(())
            }
            ValueFrame::Array(_) => Err(JoinError::MissingPropertyKey(format!(
                "property '{}' set inside an array",
                key
            ))),
        }
    }

    pub fn finish(self) -> Value {
        match self {
            ValueFrame::Object { map, .. } => Value::Object(map),
            ValueFrame::Array(items) => Value::Array(items),
        }
    }
}

/// An element whose start tag has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkupFrame {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub namespaces: Vec<(String, String)>,
    /// Set once text or a child node has been added; attributes are refused afterwards.
    pub content_started: bool,
}

impl MarkupFrame {
    pub fn new(name: &str, attributes: &[(String, String)]) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes.to_vec(),
            namespaces: Vec::new(),
            content_started: false,
        }
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), JoinError> {
        if self.content_started {
            return Err(JoinError::InvalidAttributeTarget(format!(
                "attribute '{}' after content of <{}>",
                name, self.name
            )));
        }
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn declare(&mut self, prefix: &str, uri: &str) {
        match self.namespaces.iter_mut().find(|(p, _)| p == prefix) {
            Some(entry) => entry.1 = uri.to_string(),
            None => self.namespaces.push((prefix.to_string(), uri.to_string())),
        }
    }
}

/// Converts a number to JSON, keeping integral values integral.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Text rendering of a value: strings as-is, `null` as nothing, containers as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn non_finite_text(n: f64) -> &'static str {
    if n.is_nan() {
        "NaN"
    } else if n > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

pub fn unsupported_number(n: f64) -> JoinError {
    JoinError::UnsupportedValueInMode(format!("non-finite number {}", non_finite_text(n)))
}

pub fn unsupported_undefined() -> JoinError {
    JoinError::UnsupportedValueInMode("undefined".to_string())
}
