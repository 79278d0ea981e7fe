//! The JSON tree backend: JSON path selectors over an owned `serde_json::Value`.
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use stencil_engine::{
    JoiningTransformer, Match, NodeAdapter, NodeShape, ParamValue, Slot, Terminal, TransformError,
    TransformOptions, Variables,
};
use stencil_jpath::{
    EvalOptions, EvaluationContext, JsonPath, Location, PathStep, Selected, children_of, is_truthy,
    parse_path,
};

/// A value visited by a JSON transform.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonNode {
    pub value: Value,
    pub location: Location,
    /// Set when the node was selected in property-name mode (`~`): the member's key or index.
    pub key: Option<Slot>,
}

impl JsonNode {
    pub fn new(value: Value, location: Location) -> Self {
        Self {
            value,
            location,
            key: None,
        }
    }

    pub fn is_property_name(&self) -> bool {
        self.key.is_some()
    }
}

fn slot_of(step: &PathStep) -> Slot {
    match step {
        PathStep::Key(key) => Slot::Key(key.clone()),
        PathStep::Index(index) => Slot::Index(*index),
    }
}

/// Builds the match for a value at `location`, addressed by its normalized path.
fn located(value: Value, location: Location) -> Match<JsonNode> {
    let path = location.to_string();
    let parent = location.parent().map(|p| p.to_string());
    let slot = location.last().map(slot_of);
    let mut found = Match::new(JsonNode::new(value, location), path);
    if let (Some(parent), Some(slot)) = (parent, slot) {
        found = found.with_parent(parent, slot);
    }
    found
}

/// The key node naming a selected member, for property-name mode. Its path carries a
/// `~` suffix so it never collides with the member itself. The root has no name.
fn property_name(member: &Selected<'_>) -> Option<Match<JsonNode>> {
    let slot = slot_of(member.location.last()?);
    let value = match &slot {
        Slot::Key(key) => Value::String(key.clone()),
        Slot::Index(index) => Value::from(*index),
    };
    let parent = member.location.parent()?;
    let node = JsonNode {
        value,
        location: member.location.clone(),
        key: Some(slot.clone()),
    };
    Some(Match::new(node, format!("{}~", member.location)).with_parent(parent.to_string(), slot))
}

/// Splits `$name.rest` into the variable name and the path applied to its value.
fn variable_reference(selector: &str) -> Option<(&str, &str)> {
    let rest = selector.strip_prefix('$')?;
    if !rest.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        return None;
    }
    let end = rest.find(['.', '[', '~']).unwrap_or(rest.len());
    Some((&rest[..end], &rest[end..]))
}

pub struct JsonAdapter {
    document: Value,
    options: EvalOptions,
    parsed: RefCell<HashMap<String, Rc<JsonPath>>>,
}

impl JsonAdapter {
    pub fn new(document: Value) -> Self {
        Self {
            document,
            options: EvalOptions::default(),
            parsed: RefCell::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    fn parse(&self, selector: &str) -> Result<Rc<JsonPath>, TransformError> {
        if let Some(path) = self.parsed.borrow().get(selector) {
            return Ok(Rc::clone(path));
        }
        let path = parse_path(selector).map_err(|e| TransformError::selector(selector, e))?;
        let path = Rc::new(path);
        self.parsed
            .borrow_mut()
            .insert(selector.to_string(), Rc::clone(&path));
        Ok(path)
    }

    /// Evaluates a parsed path from a context value, expanding `~` into key nodes.
    fn run(
        &self,
        selector: &str,
        path: &JsonPath,
        e_ctx: EvaluationContext<'_>,
    ) -> Result<Vec<Match<JsonNode>>, TransformError> {
        let e_ctx = e_ctx.with_options(self.options);
        let selected = stencil_jpath::select(path, &e_ctx)
            .map_err(|e| TransformError::selector(selector, e))?;
        Ok(if path.property_names {
            selected.iter().filter_map(property_name).collect()
        } else {
            selected
                .into_iter()
                .map(|s| located(s.value.clone(), s.location))
                .collect()
        })
    }

    fn evaluate_variable(
        &self,
        selector: &str,
        name: &str,
        rest: &str,
        variables: &Variables<JsonNode>,
    ) -> Result<Vec<Match<JsonNode>>, TransformError> {
        let bound = match variables.get(name) {
            Some(ParamValue::Nodes(nodes)) => nodes.clone(),
            Some(ParamValue::Value(value)) => {
                let node = JsonNode::new(value.clone(), Location::root());
                vec![Match::new(node, format!("${}", name))]
            }
            None => {
                let message = format!("unknown variable '{}'", name);
                return Err(TransformError::selector(selector, message));
            }
        };
        if rest.is_empty() {
            return Ok(bound);
        }
        let path = self.parse(&format!("@{}", rest))?;
        let mut out = Vec::new();
        for target in &bound {
            let node = &target.value;
            let e_ctx = EvaluationContext::at(&self.document, &node.value, node.location.clone());
            out.extend(self.run(selector, &path, e_ctx)?);
        }
        Ok(out)
    }

    fn copy_value(
        value: &Value,
        joiner: &mut dyn JoiningTransformer,
    ) -> Result<(), TransformError> {
        match value {
            Value::Object(map) => {
                joiner.start_object(Map::new())?;
                for (key, member) in map {
                    joiner.property(key)?;
                    Self::copy_value(member, joiner)?;
                }
                joiner.end_object()?;
            }
            Value::Array(items) => {
                joiner.start_array(Vec::new())?;
                for item in items {
                    Self::copy_value(item, joiner)?;
                }
                joiner.end_array()?;
            }
            Value::String(text) => joiner.string(text)?,
            Value::Bool(flag) => joiner.boolean(*flag)?,
            Value::Null => joiner.null()?,
            Value::Number(_) => joiner.append(value.clone())?,
        }
        Ok(())
    }
}

impl NodeAdapter for JsonAdapter {
    type Node = JsonNode;
    type Document = Value;

    fn root(&self) -> Match<JsonNode> {
        located(self.document.clone(), Location::root())
    }

    fn evaluate(
        &self,
        context: &Match<JsonNode>,
        selector: &str,
        variables: &Variables<JsonNode>,
    ) -> Result<Vec<Match<JsonNode>>, TransformError> {
        if let Some((name, rest)) = variable_reference(selector) {
            return self.evaluate_variable(selector, name, rest, variables);
        }
        let path = self.parse(selector)?;
        let node = &context.value;
        let e_ctx = EvaluationContext::at(&self.document, &node.value, node.location.clone());
        self.run(selector, &path, e_ctx)
    }

    fn evaluate_value(
        &self,
        context: &Match<JsonNode>,
        selector: &str,
        variables: &Variables<JsonNode>,
    ) -> Result<Value, TransformError> {
        Ok(self
            .evaluate(context, selector, variables)?
            .into_iter()
            .next()
            .map(|m| m.value.value)
            .unwrap_or(Value::Null))
    }

    fn test(
        &self,
        context: &Match<JsonNode>,
        selector: &str,
        variables: &Variables<JsonNode>,
    ) -> Result<bool, TransformError> {
        Ok(self
            .evaluate(context, selector, variables)?
            .first()
            .is_some_and(|m| is_truthy(&m.value.value)))
    }

    fn pattern_matches(&self, selector: &str) -> Result<Vec<Match<JsonNode>>, TransformError> {
        let path = self.parse(selector)?;
        self.run(selector, &path, EvaluationContext::new(&self.document))
    }

    fn is_root_selector(&self, selector: &str) -> bool {
        self.parse(selector).is_ok_and(|path| path.is_root())
    }

    fn terminal(&self, selector: &str) -> Result<Terminal, TransformError> {
        Ok(match self.parse(selector)?.terminal() {
            stencil_jpath::Terminal::Named => Terminal::Named,
            stencil_jpath::Terminal::Wildcard => Terminal::Wildcard,
            stencil_jpath::Terminal::Predicate => Terminal::Predicate,
        })
    }

    fn atomize(&self, node: &JsonNode) -> Value {
        node.value.clone()
    }

    fn shape(&self, node: &JsonNode) -> NodeShape {
        if node.is_property_name() {
            return NodeShape::PropertyName;
        }
        match node.value {
            Value::Object(_) | Value::Array(_) => NodeShape::Container,
            _ => NodeShape::Scalar,
        }
    }

    fn children(&self, context: &Match<JsonNode>) -> Vec<Match<JsonNode>> {
        let node = &context.value;
        if node.is_property_name() {
            return Vec::new();
        }
        let selected = Selected {
            value: &node.value,
            location: node.location.clone(),
        };
        children_of(&selected)
            .into_iter()
            .map(|s| located(s.value.clone(), s.location))
            .collect()
    }

    fn replace_in_parent(
        &mut self,
        target: &Match<JsonNode>,
        value: Value,
    ) -> Result<JsonNode, TransformError> {
        let node = &target.value;
        if node.is_property_name() {
            return Err(TransformError::ReplaceFailed {
                path: target.path.clone(),
                message: "property names cannot be replaced".into(),
            });
        }
        let slot = node
            .location
            .resolve_mut(&mut self.document)
            .ok_or_else(|| TransformError::ReplaceFailed {
                path: target.path.clone(),
                message: "no value at this location".into(),
            })?;
        *slot = value.clone();
        log::debug!("Replaced value at {}", target.path);
        Ok(JsonNode::new(value, node.location.clone()))
    }

    fn copy_to(
        &self,
        node: &Match<JsonNode>,
        joiner: &mut dyn JoiningTransformer,
    ) -> Result<(), TransformError> {
        Self::copy_value(&node.value.value, joiner)
    }

    fn configure(&mut self, options: &TransformOptions) {
        self.options.prevent_filters = options.prevent_eval;
    }

    fn swap_document(&mut self, document: Value) -> Value {
        std::mem::replace(&mut self.document, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(found: &[Match<JsonNode>]) -> Vec<&str> {
        found.iter().map(|m| m.path.as_str()).collect()
    }

    #[test]
    fn test_pattern_matches_report_normalized_paths() {
        let adapter = JsonAdapter::new(json!({ "a": { "b": 1, "c": [true] } }));
        let found = adapter.pattern_matches("$.a.*").unwrap();
        assert_eq!(paths(&found), vec!["$['a']['b']", "$['a']['c']"]);
        assert_eq!(found[1].parent.as_deref(), Some("$['a']"));
        assert_eq!(found[1].parent_slot, Some(Slot::Key("c".into())));
    }

    #[test]
    fn test_relative_evaluation_starts_at_context() {
        let adapter = JsonAdapter::new(json!({ "orders": [{ "id": "A" }, { "id": "B" }] }));
        let vars = Variables::default();
        let second = adapter.evaluate(&adapter.root(), "orders[1]", &vars).unwrap().remove(0);
        let id = adapter.evaluate(&second, "id", &vars).unwrap();
        assert_eq!(paths(&id), vec!["$['orders'][1]['id']"]);
        assert_eq!(adapter.evaluate_value(&second, "@.id", &vars).unwrap(), json!("B"));
        assert_eq!(adapter.evaluate_value(&second, "missing", &vars).unwrap(), Value::Null);
    }

    #[test]
    fn test_property_name_mode() {
        let adapter = JsonAdapter::new(json!({ "a": { "x": 1, "y": 2 } }));
        let keys = adapter.pattern_matches("$.a.*~").unwrap();
        assert_eq!(paths(&keys), vec!["$['a']['x']~", "$['a']['y']~"]);
        assert!(adapter.pattern_matches("$~").unwrap().is_empty());
        assert_eq!(adapter.shape(&keys[0].value), NodeShape::PropertyName);
        assert_eq!(adapter.atomize(&keys[1].value), json!("y"));
    }

    #[test]
    fn test_variables() {
        let adapter = JsonAdapter::new(json!({ "items": [{ "n": 1 }, { "n": 2 }] }));
        let mut vars = Variables::default();
        let items = adapter.pattern_matches("$.items[*]").unwrap();
        vars.set("picked", ParamValue::Nodes(items));
        vars.set("limit", ParamValue::Value(json!(5)));
        let ns = adapter.evaluate(&adapter.root(), "$picked.n", &vars).unwrap();
        assert_eq!(paths(&ns), vec!["$['items'][0]['n']", "$['items'][1]['n']"]);
        assert_eq!(adapter.evaluate_value(&adapter.root(), "$limit", &vars).unwrap(), json!(5));
        assert!(adapter.evaluate(&adapter.root(), "$nope", &vars).is_err());
    }

    #[test]
    fn test_terminal_classes() {
        let adapter = JsonAdapter::new(json!({}));
        assert_eq!(adapter.terminal("$.a.b").unwrap(), Terminal::Named);
        assert_eq!(adapter.terminal("$.a.*").unwrap(), Terminal::Wildcard);
        assert_eq!(adapter.terminal("$.a[0]").unwrap(), Terminal::Predicate);
        assert!(adapter.is_root_selector("$"));
        assert!(!adapter.is_root_selector("$.a"));
    }

    #[test]
    fn test_prevent_eval_rejects_filters() {
        let mut adapter = JsonAdapter::new(json!({ "xs": [{ "ok": true }] }));
        assert_eq!(adapter.pattern_matches("$.xs[?(@.ok)]").unwrap().len(), 1);
        adapter.configure(&TransformOptions {
            prevent_eval: true,
            ..Default::default()
        });
        assert!(matches!(
            adapter.pattern_matches("$.xs[?(@.ok)]"),
            Err(TransformError::Selector { .. })
        ));
    }

    #[test]
    fn test_replace_in_parent() {
        let mut adapter = JsonAdapter::new(json!({ "a": [1, 2] }));
        let target = adapter.pattern_matches("$.a[1]").unwrap().remove(0);
        let node = adapter.replace_in_parent(&target, json!("two")).unwrap();
        assert_eq!(node.value, json!("two"));
        assert_eq!(adapter.document(), &json!({ "a": [1, "two"] }));

        let keys = adapter.pattern_matches("$.a~").unwrap();
        assert!(adapter.replace_in_parent(&keys[0], json!("b")).is_err());
    }
}
