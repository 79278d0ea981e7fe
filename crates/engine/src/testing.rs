//! A minimal backend over `serde_json::Value` with dotted paths, used by the engine tests.
//!
//! Selectors: `$` is the root, `.` the context node, `*` its children, `a.0.b` walks
//! keys and indices, `$.a` walks from the root and `$name` reads a variable. As rule
//! patterns, `*` matches every non-root node, `?key` every object holding `key`, and
//! a dotted path every node whose path ends with it.
use crate::adapter::{Match, NodeAdapter, NodeShape, Slot};
use crate::config::TransformOptions;
use crate::context::DispatchContext;
use crate::error::TransformError;
use crate::priority::Terminal;
use crate::registry::RuleDeclaration;
use crate::scope::{ParamValue, Variables};
use serde_json::Value;
use stencil_joiner::{JoiningTransformer, JsonJoiner, Output};

pub struct TreeAdapter {
    pub data: Value,
}

impl TreeAdapter {
    fn root_match(&self) -> Match<Value> {
        Match::new(self.data.clone(), "$")
    }

    fn child_matches(context: &Match<Value>) -> Vec<Match<Value>> {
        let path = &context.path;
        match &context.value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    Match::new(v.clone(), format!("{}.{}", path, k))
                        .with_parent(path.clone(), Slot::Key(k.clone()))
                })
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    Match::new(v.clone(), format!("{}.{}", path, i))
                        .with_parent(path.clone(), Slot::Index(i))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn step(matches: Vec<Match<Value>>, step: &str) -> Vec<Match<Value>> {
        matches
            .iter()
            .flat_map(|m| {
                Self::child_matches(m).into_iter().filter(|child| {
                    step == "*" || child.parent_slot.as_ref().is_some_and(|s| s.to_string() == step)
                })
            })
            .collect()
    }

    fn walk(start: Match<Value>, steps: &str) -> Vec<Match<Value>> {
        steps
            .split('.')
            .filter(|s| !s.is_empty())
            .fold(vec![start], Self::step)
    }

    fn all_nodes(&self) -> Vec<Match<Value>> {
        let mut out = Vec::new();
        let mut stack = vec![self.root_match()];
        while let Some(m) = stack.pop() {
            let mut children = Self::child_matches(&m);
            children.reverse();
            stack.extend(children);
            out.push(m);
        }
        out
    }
}

impl NodeAdapter for TreeAdapter {
    type Node = Value;
    type Document = Value;

    fn root(&self) -> Match<Value> {
        self.root_match()
    }

    fn evaluate(
        &self,
        context: &Match<Value>,
        selector: &str,
        variables: &Variables<Value>,
    ) -> Result<Vec<Match<Value>>, TransformError> {
        let selector = selector.trim();
        if selector == "." {
            return Ok(vec![context.clone()]);
        }
        if let Some(rest) = selector.strip_prefix('$') {
            if rest.is_empty() || rest.starts_with('.') {
                return Ok(Self::walk(self.root_match(), rest));
            }
            return match variables.get(rest) {
                Some(ParamValue::Nodes(nodes)) => Ok(nodes.clone()),
                Some(ParamValue::Value(value)) => Ok(vec![Match::new(value.clone(), selector)]),
                None => Err(TransformError::selector(selector, "unknown variable")),
            };
        }
        Ok(Self::walk(context.clone(), selector))
    }

    fn evaluate_value(
        &self,
        context: &Match<Value>,
        selector: &str,
        variables: &Variables<Value>,
    ) -> Result<Value, TransformError> {
        Ok(self
            .evaluate(context, selector, variables)?
            .into_iter()
            .next()
            .map(|m| m.value)
            .unwrap_or(Value::Null))
    }

    fn test(
        &self,
        context: &Match<Value>,
        selector: &str,
        variables: &Variables<Value>,
    ) -> Result<bool, TransformError> {
        Ok(!matches!(
            self.evaluate_value(context, selector, variables)?,
            Value::Null | Value::Bool(false)
        ))
    }

    fn pattern_matches(&self, selector: &str) -> Result<Vec<Match<Value>>, TransformError> {
        let nodes = self.all_nodes().into_iter();
        Ok(match selector {
            "$" => vec![self.root_match()],
            "*" => nodes.filter(|m| m.parent.is_some()).collect(),
            s if s.starts_with('?') => nodes
                .filter(|m| m.value.get(&s[1..]).is_some() && m.value.is_object())
                .collect(),
            s => {
                let suffix = format!(".{}", s);
                nodes.filter(|m| m.path.ends_with(&suffix)).collect()
            }
        })
    }

    fn is_root_selector(&self, selector: &str) -> bool {
        selector == "$"
    }

    fn terminal(&self, selector: &str) -> Result<Terminal, TransformError> {
        Ok(match selector {
            "*" => Terminal::Wildcard,
            s if s.starts_with('?') => Terminal::Predicate,
            _ => Terminal::Named,
        })
    }

    fn atomize(&self, node: &Value) -> Value {
        node.clone()
    }

    fn shape(&self, node: &Value) -> NodeShape {
        match node {
            Value::Object(_) | Value::Array(_) => NodeShape::Container,
            _ => NodeShape::Scalar,
        }
    }

    fn children(&self, context: &Match<Value>) -> Vec<Match<Value>> {
        Self::child_matches(context)
    }

    fn replace_in_parent(
        &mut self,
        target: &Match<Value>,
        value: Value,
    ) -> Result<Value, TransformError> {
        let mut slot = &mut self.data;
        for step in target.path.split('.').skip(1) {
            slot = match slot {
                Value::Object(map) => map.get_mut(step),
                Value::Array(items) => step.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
                _ => None,
            }
            .ok_or_else(|| TransformError::ReplaceFailed {
                path: target.path.clone(),
                message: "no such node".into(),
            })?;
        }
        *slot = value.clone();
        Ok(value)
    }

    fn copy_to(
        &self,
        node: &Match<Value>,
        joiner: &mut dyn JoiningTransformer,
    ) -> Result<(), TransformError> {
        Ok(joiner.append(node.value.clone())?)
    }

    fn swap_document(&mut self, document: Value) -> Value {
        std::mem::replace(&mut self.data, document)
    }
}

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn context_with(
    data: Value,
    rules: Vec<RuleDeclaration<TreeAdapter>>,
    options: TransformOptions,
) -> DispatchContext<TreeAdapter> {
    init();
    DispatchContext::new(TreeAdapter { data }, rules, Box::new(JsonJoiner::new()), options).unwrap()
}

pub fn context(
    data: Value,
    rules: Vec<RuleDeclaration<TreeAdapter>>,
) -> DispatchContext<TreeAdapter> {
    context_with(data, rules, TransformOptions::default())
}

/// Runs a transform and unwraps the JSON output.
pub fn run(ctx: &mut DispatchContext<TreeAdapter>, mode: Option<&str>) -> Value {
    match ctx.transform(mode).unwrap() {
        Output::Json(value) => value,
        other => panic!("Expected JSON output, got {:?}", other),
    }
}
