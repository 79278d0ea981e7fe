//! The capability set a tree backend provides to the dispatch engine.
//!
//! A backend owns its input document, evaluates selectors against it and knows how
//! to render its nodes into a [`JoiningTransformer`]. Everything else (rule choice,
//! sorting, grouping, namespaces) lives in the engine and is shared.
use crate::config::TransformOptions;
use crate::error::TransformError;
use crate::priority::Terminal;
use crate::scope::Variables;
use serde_json::Value;
use std::fmt::{self, Debug};
use stencil_joiner::JoiningTransformer;

/// How a node sits inside its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Key(String),
    Index(usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Key(key) => write!(f, "{}", key),
            Slot::Index(index) => write!(f, "{}", index),
        }
    }
}

/// One node a selector resolved to, with enough addressing to find it again.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<N> {
    pub value: N,
    /// Path of the parent node, `None` for the root.
    pub parent: Option<String>,
    pub parent_slot: Option<Slot>,
    /// Normalized path identifying this node within its document.
    pub path: String,
}

impl<N> Match<N> {
    pub fn new(value: N, path: impl Into<String>) -> Self {
        Self {
            value,
            parent: None,
            parent_slot: None,
            path: path.into(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>, slot: Slot) -> Self {
        self.parent = Some(parent.into());
        self.parent_slot = Some(slot);
        self
    }
}

/// Runtime shape of a node, used to pick the built-in rule when no declared rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    /// Has children; the built-in rule descends into them.
    Container,
    /// Renders as its value.
    Scalar,
    /// A key reached in property-name mode; renders as the key.
    PropertyName,
    /// Produces nothing by default (comments, processing instructions).
    Opaque,
}

pub trait NodeAdapter {
    type Node: Clone + Debug;
    /// A replacement input for `document(...)` sub-runs.
    type Document;

    /// The match for the whole input tree.
    fn root(&self) -> Match<Self::Node>;

    /// Evaluates `selector` relative to `context`, in the backend's native order.
    fn evaluate(
        &self,
        context: &Match<Self::Node>,
        selector: &str,
        variables: &Variables<Self::Node>,
    ) -> Result<Vec<Match<Self::Node>>, TransformError>;

    /// Evaluates `selector` to a single atomic value (sort and group keys, `value_of`).
    fn evaluate_value(
        &self,
        context: &Match<Self::Node>,
        selector: &str,
        variables: &Variables<Self::Node>,
    ) -> Result<Value, TransformError>;

    /// Evaluates `selector` as a boolean test.
    fn test(
        &self,
        context: &Match<Self::Node>,
        selector: &str,
        variables: &Variables<Self::Node>,
    ) -> Result<bool, TransformError>;

    /// Every node a rule selector matches anywhere in the document.
    fn pattern_matches(&self, selector: &str) -> Result<Vec<Match<Self::Node>>, TransformError>;

    /// True if the selector denotes the document root.
    fn is_root_selector(&self, selector: &str) -> bool;

    fn terminal(&self, selector: &str) -> Result<Terminal, TransformError>;

    fn atomize(&self, node: &Self::Node) -> Value;

    fn string_value(&self, node: &Self::Node) -> String {
        stencil_joiner::value_text(&self.atomize(node))
    }

    fn shape(&self, node: &Self::Node) -> NodeShape;

    fn children(&self, context: &Match<Self::Node>) -> Vec<Match<Self::Node>>;

    /// Writes `value` into the input at the match's position and returns the node now there.
    fn replace_in_parent(
        &mut self,
        target: &Match<Self::Node>,
        value: Value,
    ) -> Result<Self::Node, TransformError>;

    /// Deep-copies a node into the output.
    fn copy_to(
        &self,
        node: &Match<Self::Node>,
        joiner: &mut dyn JoiningTransformer,
    ) -> Result<(), TransformError>;

    /// Applies run options that change selector evaluation.
    fn configure(&mut self, _options: &TransformOptions) {}

    /// Installs a different input document and returns the previous one.
    fn swap_document(&mut self, document: Self::Document) -> Self::Document;
}
