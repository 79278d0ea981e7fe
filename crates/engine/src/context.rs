//! The per-run state a transformation threads through every rule body.
//!
//! # Execution model
//!
//! - **Navigation**: the current match and active mode. Every descent installs a new
//!   match and restores the previous one on return, including on error.
//! - **Variables**: a frame is pushed for each rule, callback and group body.
//! - **Grouping state**: the current group and its key, live only inside `for_each_group`.
//! - **Namespaces**: pending declarations for the open elements of the active output.
//!
//! The operations themselves live in `handlers/*`, one concern per file.
use crate::adapter::{Match, NodeAdapter};
use crate::config::TransformOptions;
use crate::error::TransformError;
use crate::logger::{MessageLogger, NoopLogger};
use crate::namespace::NamespaceTracker;
use crate::registry::{RuleDeclaration, RuleRegistry};
use crate::scope::{ParamValue, Variables};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use stencil_joiner::{JoiningTransformer, Output};

/// A rule selector resolved against the current document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledPattern {
    pub paths: HashSet<String>,
    pub priority: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KeyDefinition {
    pub match_selector: String,
    pub use_selector: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PropertySet {
    pub properties: Map<String, Value>,
    pub use_sets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GroupingState<N> {
    pub members: Vec<Match<N>>,
    pub key: Value,
}

pub struct DispatchContext<A: NodeAdapter> {
    pub(crate) adapter: A,
    pub(crate) registry: Rc<RuleRegistry<A>>,
    pub(crate) joiner: Box<dyn JoiningTransformer>,
    pub(crate) options: TransformOptions,
    pub(crate) specificity: Option<Rc<dyn Fn(&str) -> f64>>,
    pub(crate) logger: Box<dyn MessageLogger>,

    // --- Navigation ---
    pub(crate) current: Match<A::Node>,
    pub(crate) mode: Option<String>,
    /// False until the first `apply_templates` of a run (or of a `document` sub-run).
    pub(crate) started: bool,

    pub(crate) variables: Variables<A::Node>,
    pub(crate) params: Vec<(String, ParamValue<A::Node>)>,
    pub(crate) keys: HashMap<String, KeyDefinition>,
    pub(crate) key_indexes: HashMap<String, HashMap<String, Vec<Match<A::Node>>>>,
    pub(crate) property_sets: HashMap<String, PropertySet>,
    pub(crate) grouping: Option<GroupingState<A::Node>>,
    pub(crate) namespaces: NamespaceTracker,
    /// Keyed by the rule's declaration index.
    pub(crate) patterns: HashMap<usize, Rc<CompiledPattern>>,
    pub(crate) result_documents: IndexMap<String, Output>,
}

impl<A: NodeAdapter> DispatchContext<A> {
    pub fn new(
        mut adapter: A,
        rules: Vec<RuleDeclaration<A>>,
        mut joiner: Box<dyn JoiningTransformer>,
        options: TransformOptions,
    ) -> Result<Self, TransformError> {
        let registry = RuleRegistry::new(&adapter, rules)?;
        adapter.configure(&options);
        joiner.set_permissive(options.permissive);
        let mut namespaces = NamespaceTracker::new();
        namespaces.exclude(&options.exclude_result_prefixes);
        let mode = options.mode.clone();
        let current = adapter.root();
        Ok(Self {
            adapter,
            registry: Rc::new(registry),
            joiner,
            options,
            specificity: None,
            logger: Box::new(NoopLogger),
            current,
            mode,
            started: false,
            variables: Variables::default(),
            params: Vec::new(),
            keys: HashMap::new(),
            key_indexes: HashMap::new(),
            property_sets: HashMap::new(),
            grouping: None,
            namespaces,
            patterns: HashMap::new(),
            result_documents: IndexMap::new(),
        })
    }

    /// Replaces the default selector specificity with a custom scoring function.
    pub fn with_specificity<F>(mut self, specificity: F) -> Self
    where
        F: Fn(&str) -> f64 + 'static,
    {
        self.specificity = Some(Rc::new(specificity));
        self.patterns.clear();
        self
    }

    pub fn with_logger(mut self, logger: impl MessageLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Runs the rule set over the whole input and returns the finished output.
    pub fn transform(&mut self, mode: Option<&str>) -> Result<Output, TransformError> {
        self.mode = mode.map(str::to_string).or_else(|| self.options.mode.clone());
        self.current = self.adapter.root();
        self.started = false;
        log::debug!(
            "Starting transform in mode {:?} with {} rule(s)",
            self.mode,
            self.registry.len()
        );
        self.apply_templates_in_current_mode(None, None)?;
        Ok(self.joiner.get()?)
    }

    // --- Accessors ---

    pub fn current(&self) -> &Match<A::Node> {
        &self.current
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn registry(&self) -> &RuleRegistry<A> {
        &self.registry
    }

    /// Direct access to the output builder, bypassing namespace tracking.
    pub fn joiner_mut(&mut self) -> &mut dyn JoiningTransformer {
        self.joiner.as_mut()
    }

    /// Installs `target` as the current match for the duration of `body`, in a fresh
    /// variable frame. The previous navigation is restored however `body` returns.
    pub(crate) fn visit<R, F>(
        &mut self,
        target: Match<A::Node>,
        mode: Option<String>,
        body: F,
    ) -> Result<R, TransformError>
    where
        F: FnOnce(&mut Self) -> Result<R, TransformError>,
    {
        let saved_current = std::mem::replace(&mut self.current, target);
        let saved_mode = std::mem::replace(&mut self.mode, mode);
        self.variables.push();
        let result = body(self);
        self.variables.pop();
        self.mode = saved_mode;
        self.current = saved_current;
        result
    }

    /// Drops everything derived from the input document.
    pub(crate) fn invalidate_caches(&mut self) {
        self.patterns.clear();
        self.key_indexes.clear();
    }

    // --- Primitive emission ---

    pub fn append(&mut self, value: Value) -> Result<(), TransformError> {
        Ok(self.joiner.append(value)?)
    }

    pub fn string(&mut self, value: &str) -> Result<(), TransformError> {
        Ok(self.joiner.string(value)?)
    }

    pub fn number(&mut self, value: f64) -> Result<(), TransformError> {
        Ok(self.joiner.number(value)?)
    }

    pub fn boolean(&mut self, value: bool) -> Result<(), TransformError> {
        Ok(self.joiner.boolean(value)?)
    }

    pub fn null(&mut self) -> Result<(), TransformError> {
        Ok(self.joiner.null()?)
    }

    pub fn undefined(&mut self) -> Result<(), TransformError> {
        Ok(self.joiner.undefined()?)
    }

    /// Names the slot the next value fills inside the innermost open object.
    pub fn property(&mut self, key: &str) -> Result<(), TransformError> {
        Ok(self.joiner.property(key)?)
    }

    // --- Variables ---

    pub fn variable(&mut self, name: &str, value: impl Into<ParamValue<A::Node>>) {
        self.variables.set(name, value.into());
    }

    pub fn get_variable(&self, name: &str) -> Option<&ParamValue<A::Node>> {
        self.variables.get(name)
    }

    /// A variable as JSON, with nodes atomized.
    pub fn variable_value(&self, name: &str) -> Option<Value> {
        self.variables
            .get(name)
            .map(|value| value.to_value(|node| self.adapter.atomize(node)))
    }

    pub fn variables(&self) -> &Variables<A::Node> {
        &self.variables
    }

    /// Sends a message to the configured logger.
    pub fn message(&self, text: &str) {
        self.logger.log(text);
    }
}
