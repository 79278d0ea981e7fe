//! The XML tree backend: XPath selectors over an owned [`XmlDocument`].
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use stencil_engine::{
    JoiningTransformer, Match, NodeAdapter, NodeShape, ParamValue, Slot, Terminal, TransformError,
    Variables,
};
use stencil_joiner::{number_value, value_text};
use stencil_xpath::{
    EvaluationContext, Expression, NodeId, NodeKind, NodeType, XPathValue, XmlDocument, evaluate,
    parse_expression, select_nodes,
};

/// Variables as the XPath evaluator sees them. JSON values become strings, numbers
/// or booleans; containers are passed as their JSON text.
fn xpath_variables(variables: &Variables<NodeId>) -> HashMap<String, XPathValue> {
    variables
        .visible()
        .into_iter()
        .map(|(name, value)| {
            let converted = match value {
                ParamValue::Nodes(nodes) => {
                    XPathValue::NodeSet(nodes.iter().map(|m| m.value).collect())
                }
                ParamValue::Value(Value::Bool(flag)) => XPathValue::Boolean(*flag),
                ParamValue::Value(Value::Number(n)) => {
                    XPathValue::Number(n.as_f64().unwrap_or(f64::NAN))
                }
                ParamValue::Value(other) => XPathValue::String(value_text(other)),
            };
            (name.to_string(), converted)
        })
        .collect()
}

pub struct XmlAdapter {
    document: XmlDocument,
    expressions: RefCell<HashMap<String, Rc<Expression>>>,
    patterns: RefCell<HashMap<String, Rc<Expression>>>,
}

impl XmlAdapter {
    pub fn new(document: XmlDocument) -> Self {
        Self {
            document,
            expressions: RefCell::new(HashMap::new()),
            patterns: RefCell::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    pub fn into_document(self) -> XmlDocument {
        self.document
    }

    /// The match for a node, addressed by its document path.
    pub fn match_of(&self, id: NodeId) -> Match<NodeId> {
        let doc = &self.document;
        let found = Match::new(id, doc.path(id));
        let Some(parent) = doc.parent(id) else {
            return found;
        };
        let slot = match doc.node_type(id) {
            NodeType::Attribute => {
                Slot::Key(doc.name(id).map(|n| n.to_string()).unwrap_or_default())
            }
            _ => {
                let position = doc.children(parent).iter().position(|&c| c == id);
                Slot::Index(position.unwrap_or_default())
            }
        };
        found.with_parent(doc.path(parent), slot)
    }

    fn expression(&self, selector: &str) -> Result<Rc<Expression>, TransformError> {
        if let Some(expr) = self.expressions.borrow().get(selector) {
            return Ok(Rc::clone(expr));
        }
        let expr = parse_expression(selector).map_err(|e| TransformError::selector(selector, e))?;
        let expr = Rc::new(expr);
        self.expressions
            .borrow_mut()
            .insert(selector.to_string(), Rc::clone(&expr));
        Ok(expr)
    }

    fn pattern(&self, selector: &str) -> Result<Rc<Expression>, TransformError> {
        if let Some(expr) = self.patterns.borrow().get(selector) {
            return Ok(Rc::clone(expr));
        }
        let expr = Rc::new(self.expression(selector)?.to_match_pattern());
        self.patterns
            .borrow_mut()
            .insert(selector.to_string(), Rc::clone(&expr));
        Ok(expr)
    }

    fn evaluate_raw(
        &self,
        context: NodeId,
        selector: &str,
        variables: &Variables<NodeId>,
    ) -> Result<XPathValue, TransformError> {
        let expr = self.expression(selector)?;
        let vars = xpath_variables(variables);
        let e_ctx = EvaluationContext::new(&self.document, context, &vars);
        evaluate(&expr, &e_ctx).map_err(|e| TransformError::selector(selector, e))
    }

    fn copy_node(
        &self,
        id: NodeId,
        joiner: &mut dyn JoiningTransformer,
    ) -> Result<(), TransformError> {
        let doc = &self.document;
        match doc.kind(id) {
            NodeKind::Root => {
                for &child in doc.children(id) {
                    self.copy_node(child, joiner)?;
                }
            }
            NodeKind::Element {
                name,
                attributes,
                namespaces,
            } => {
                let attrs: Vec<(String, String)> = attributes
                    .iter()
                    .filter_map(|&attr| match doc.kind(attr) {
                        NodeKind::Attribute { name, value } => {
                            Some((name.to_string(), value.clone()))
                        }
                        _ => None,
                    })
                    .collect();
                joiner.start_element(&name.to_string(), &attrs)?;
                let depth = joiner.element_depth();
                for (prefix, uri) in namespaces {
                    joiner.namespace(depth, prefix, uri)?;
                }
                for &child in doc.children(id) {
                    self.copy_node(child, joiner)?;
                }
                joiner.end_element()?;
            }
            NodeKind::Attribute { name, value } => joiner.attribute(&name.to_string(), value)?,
            NodeKind::Text(text) => joiner.text(text)?,
            NodeKind::Comment(text) => joiner.comment(text)?,
            NodeKind::ProcessingInstruction { target, data } => {
                joiner.processing_instruction(target, data)?
            }
        }
        Ok(())
    }
}

impl NodeAdapter for XmlAdapter {
    type Node = NodeId;
    type Document = XmlDocument;

    fn root(&self) -> Match<NodeId> {
        self.match_of(self.document.root())
    }

    fn evaluate(
        &self,
        context: &Match<NodeId>,
        selector: &str,
        variables: &Variables<NodeId>,
    ) -> Result<Vec<Match<NodeId>>, TransformError> {
        let expr = self.expression(selector)?;
        let vars = xpath_variables(variables);
        let e_ctx = EvaluationContext::new(&self.document, context.value, &vars);
        let nodes = select_nodes(&expr, &e_ctx).map_err(|e| TransformError::selector(selector, e))?;
        Ok(nodes.into_iter().map(|id| self.match_of(id)).collect())
    }

    /// Node-sets yield the string value of their first node, or `null` when empty.
    fn evaluate_value(
        &self,
        context: &Match<NodeId>,
        selector: &str,
        variables: &Variables<NodeId>,
    ) -> Result<Value, TransformError> {
        Ok(match self.evaluate_raw(context.value, selector, variables)? {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map_or(Value::Null, |&n| Value::String(self.document.string_value(n))),
            XPathValue::String(s) => Value::String(s),
            XPathValue::Number(n) => number_value(n),
            XPathValue::Boolean(b) => Value::Bool(b),
        })
    }

    fn test(
        &self,
        context: &Match<NodeId>,
        selector: &str,
        variables: &Variables<NodeId>,
    ) -> Result<bool, TransformError> {
        Ok(self.evaluate_raw(context.value, selector, variables)?.to_bool())
    }

    fn pattern_matches(&self, selector: &str) -> Result<Vec<Match<NodeId>>, TransformError> {
        let pattern = self.pattern(selector)?;
        let vars = HashMap::new();
        let e_ctx = EvaluationContext::new(&self.document, self.document.root(), &vars);
        let nodes =
            select_nodes(&pattern, &e_ctx).map_err(|e| TransformError::selector(selector, e))?;
        Ok(nodes.into_iter().map(|id| self.match_of(id)).collect())
    }

    fn is_root_selector(&self, selector: &str) -> bool {
        self.expression(selector).is_ok_and(|expr| expr.is_root_path())
    }

    fn terminal(&self, selector: &str) -> Result<Terminal, TransformError> {
        Ok(match self.expression(selector)?.terminal() {
            stencil_xpath::Terminal::Named => Terminal::Named,
            stencil_xpath::Terminal::Wildcard => Terminal::Wildcard,
            stencil_xpath::Terminal::Predicate => Terminal::Predicate,
        })
    }

    fn atomize(&self, node: &NodeId) -> Value {
        Value::String(self.document.string_value(*node))
    }

    fn string_value(&self, node: &NodeId) -> String {
        self.document.string_value(*node)
    }

    fn shape(&self, node: &NodeId) -> NodeShape {
        match self.document.node_type(*node) {
            NodeType::Root | NodeType::Element => NodeShape::Container,
            NodeType::Text | NodeType::Attribute => NodeShape::Scalar,
            NodeType::Comment | NodeType::ProcessingInstruction => NodeShape::Opaque,
        }
    }

    fn children(&self, context: &Match<NodeId>) -> Vec<Match<NodeId>> {
        self.document
            .children(context.value)
            .iter()
            .map(|&id| self.match_of(id))
            .collect()
    }

    /// Elements have their content replaced by the value's text; other nodes take it as
    /// their value.
    fn replace_in_parent(
        &mut self,
        target: &Match<NodeId>,
        value: Value,
    ) -> Result<NodeId, TransformError> {
        let id = target.value;
        if id >= self.document.len() {
            return Err(TransformError::ReplaceFailed {
                path: target.path.clone(),
                message: "node is not part of the current document".into(),
            });
        }
        self.document.replace_value(id, &value_text(&value));
        log::debug!("Replaced value of {}", target.path);
        Ok(id)
    }

    fn copy_to(
        &self,
        node: &Match<NodeId>,
        joiner: &mut dyn JoiningTransformer,
    ) -> Result<(), TransformError> {
        self.copy_node(node.value, joiner)
    }

    fn swap_document(&mut self, document: XmlDocument) -> XmlDocument {
        std::mem::replace(&mut self.document, document)
    }
}
