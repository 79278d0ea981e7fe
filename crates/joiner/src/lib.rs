//! Joining transformers: the output builders a transformation run writes into.
//!
//! The engine drives a single [`JoiningTransformer`] in visitation order. Each
//! backend decides what the calls mean for its representation:
//!
//! - [`StringJoiner`] concatenates text and serializes markup.
//! - [`JsonJoiner`] builds a `serde_json::Value`.
//! - [`DomJoiner`] builds a queryable [`XmlDocument`].

pub mod config;
pub mod dom;
pub mod error;
mod frame;
pub mod json;
pub mod string;

pub use config::{CharacterMap, Escaping, OutputConfig, OutputMethod};
pub use dom::{DomJoiner, serialize_document};
pub use error::JoinError;
pub use frame::{number_value, value_text};
pub use json::JsonJoiner;
pub use string::StringJoiner;

use serde_json::{Map, Value};
use stencil_xpath::XmlDocument;

/// The finished product of a joiner.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Text(String),
    Json(Value),
    Document(XmlDocument),
}

impl Output {
    /// A textual view of any output: documents are serialized, JSON is stringified.
    pub fn to_text(&self) -> Result<String, JoinError> {
        match self {
            Output::Text(text) => Ok(text.clone()),
            Output::Json(value) => Ok(value.to_string()),
            Output::Document(doc) => serialize_document(doc),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Output::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&XmlDocument> {
        match self {
            Output::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

/// A trait that describes the actions of building output, independent of its representation.
pub trait JoiningTransformer {
    /// Merges a value into the current output position.
    fn append(&mut self, value: Value) -> Result<(), JoinError>;

    fn string(&mut self, value: &str) -> Result<(), JoinError> {
        self.append(Value::String(value.to_string()))
    }

    /// Non-finite numbers are refused unless the joiner is permissive.
    fn number(&mut self, value: f64) -> Result<(), JoinError>;

    fn boolean(&mut self, value: bool) -> Result<(), JoinError> {
        self.append(Value::Bool(value))
    }

    fn null(&mut self) -> Result<(), JoinError> {
        self.append(Value::Null)
    }

    /// Emits nothing in permissive mode, fails otherwise.
    fn undefined(&mut self) -> Result<(), JoinError>;

    /// Names the slot the next value fills inside the innermost open object.
    fn property(&mut self, key: &str) -> Result<(), JoinError>;

    // --- Structured scopes ---
    fn start_object(&mut self, seed: Map<String, Value>) -> Result<(), JoinError>;
    fn end_object(&mut self) -> Result<(), JoinError>;
    fn start_array(&mut self, seed: Vec<Value>) -> Result<(), JoinError>;
    fn end_array(&mut self) -> Result<(), JoinError>;

    // --- Markup ---
    fn start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
    ) -> Result<(), JoinError>;
    fn end_element(&mut self) -> Result<(), JoinError>;
    /// Sets an attribute on the innermost open element, before any of its content.
    fn attribute(&mut self, name: &str, value: &str) -> Result<(), JoinError>;
    /// Writes a namespace declaration onto the open element at `depth` (1 = outermost).
    fn namespace(&mut self, depth: usize, prefix: &str, uri: &str) -> Result<(), JoinError>;
    fn text(&mut self, text: &str) -> Result<(), JoinError>;
    fn comment(&mut self, text: &str) -> Result<(), JoinError>;
    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), JoinError>;
    /// The number of currently open elements.
    fn element_depth(&self) -> usize;

    // --- Configuration ---
    fn output(&mut self, config: OutputConfig);
    fn character_map(&mut self, name: &str, map: CharacterMap);
    fn set_permissive(&mut self, permissive: bool);

    /// Finalizes and returns the accumulated output. Fails if a scope is still open.
    fn get(&mut self) -> Result<Output, JoinError>;
}

pub(crate) fn depth_error(depth: usize, open: usize) -> JoinError {
    JoinError::InvalidAttributeTarget(format!(
        "namespace for element depth {} with {} element(s) open",
        depth, open
    ))
}
