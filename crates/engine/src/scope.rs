//! Variables and template parameters.
use crate::adapter::Match;
use serde_json::Value;
use std::collections::HashMap;

/// A bound value: a literal, or the nodes a selector produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue<N> {
    Value(Value),
    Nodes(Vec<Match<N>>),
}

impl<N> ParamValue<N> {
    /// The value as JSON, atomizing nodes with `atomize`. A single node is unwrapped.
    pub fn to_value(&self, atomize: impl Fn(&N) -> Value) -> Value {
        match self {
            ParamValue::Value(value) => value.clone(),
            ParamValue::Nodes(nodes) if nodes.len() == 1 => atomize(&nodes[0].value),
            ParamValue::Nodes(nodes) => {
                Value::Array(nodes.iter().map(|m| atomize(&m.value)).collect())
            }
        }
    }
}

impl<N> From<Value> for ParamValue<N> {
    fn from(value: Value) -> Self {
        ParamValue::Value(value)
    }
}

/// An argument to `call_template`, resolved against the current node at call time.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Literal(Value),
    Select(String),
}

/// Lexically nested variable frames. Inner frames shadow outer ones.
#[derive(Debug, Clone)]
pub struct Variables<N> {
    frames: Vec<HashMap<String, ParamValue<N>>>,
}

impl<N> Default for Variables<N> {
    fn default() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }
}

impl<N> Variables<N> {
    pub fn get(&self, name: &str) -> Option<&ParamValue<N>> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue<N>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Every visible binding, innermost first.
    pub fn visible(&self) -> Vec<(&str, &ParamValue<N>)> {
        let mut seen: Vec<(&str, &ParamValue<N>)> = Vec::new();
        for frame in self.frames.iter().rev() {
            for (name, value) in frame {
                if !seen.iter().any(|(n, _)| *n == name) {
                    seen.push((name.as_str(), value));
                }
            }
        }
        seen
    }

    pub(crate) fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub(crate) fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
}
