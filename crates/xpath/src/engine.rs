//! The evaluation engine for executing a parsed XPath AST against an [`XmlDocument`].

use super::ast::{
    Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step, UnaryOperator,
};
use super::{axes, functions};
use crate::document::{NodeId, NodeType, XmlDocument};
use crate::error::XPathError;
use std::collections::HashMap;

/// Represents the possible result types of an XPath expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    NodeSet(Vec<NodeId>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl XPathValue {
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    pub fn to_number(&self, doc: &XmlDocument) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            other => parse_number(&other.to_string_value(doc)),
        }
    }

    /// String conversion. A node-set converts via its first node.
    pub fn to_string_value(&self, doc: &XmlDocument) -> String {
        match self {
            XPathValue::NodeSet(nodes) => {
                nodes.first().map(|&n| doc.string_value(n)).unwrap_or_default()
            }
            XPathValue::String(s) => s.clone(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::Boolean(b) => b.to_string(),
        }
    }
}

/// Parses a string as an XPath number: optional whitespace and minus sign, digits and an
/// optional fraction.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    let body = t.strip_prefix('-').unwrap_or(t);
    let valid = !body.is_empty()
        && body != "."
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.chars().filter(|&c| c == '.').count() <= 1;
    if valid { t.parse().unwrap_or(f64::NAN) } else { f64::NAN }
}

/// Formats a number the way XPath `string()` does: integers without a fraction.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// The state needed during expression evaluation.
pub struct EvaluationContext<'d> {
    pub document: &'d XmlDocument,
    pub context_node: NodeId,
    pub context_position: usize, // 1-based
    pub context_size: usize,
    pub variables: &'d HashMap<String, XPathValue>,
}

impl<'d> EvaluationContext<'d> {
    pub fn new(
        document: &'d XmlDocument,
        context_node: NodeId,
        variables: &'d HashMap<String, XPathValue>,
    ) -> Self {
        Self {
            document,
            context_node,
            context_position: 1,
            context_size: 1,
            variables,
        }
    }

    fn at(&self, node: NodeId, position: usize, size: usize) -> Self {
        Self {
            document: self.document,
            context_node: node,
            context_position: position,
            context_size: size,
            variables: self.variables,
        }
    }
}

/// Evaluates a compiled expression and returns a concrete `XPathValue`.
pub fn evaluate(
    expr: &Expression,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            Ok(XPathValue::NodeSet(evaluate_location_path(path, e_ctx)?))
        }
        Expression::Variable(name) => e_ctx
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| XPathError::UnknownVariable(name.clone())),
        Expression::FunctionCall { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, e_ctx)?);
            }
            functions::evaluate_function(name, evaluated, e_ctx)
        }
        Expression::BinaryOp { left, op, right } => {
            // `and`/`or` short-circuit.
            match op {
                BinaryOperator::And => {
                    return Ok(XPathValue::Boolean(
                        evaluate(left, e_ctx)?.to_bool() && evaluate(right, e_ctx)?.to_bool(),
                    ));
                }
                BinaryOperator::Or => {
                    return Ok(XPathValue::Boolean(
                        evaluate(left, e_ctx)?.to_bool() || evaluate(right, e_ctx)?.to_bool(),
                    ));
                }
                _ => {}
            }
            let l = evaluate(left, e_ctx)?;
            let r = evaluate(right, e_ctx)?;
            binary(*op, l, r, e_ctx.document)
        }
        Expression::UnaryOp { op, expr } => {
            let val = evaluate(expr, e_ctx)?;
            match op {
                UnaryOperator::Minus => Ok(XPathValue::Number(-val.to_number(e_ctx.document))),
            }
        }
        Expression::Filter { expr, predicates } => {
            let nodes = select_nodes(expr, e_ctx)?;
            Ok(XPathValue::NodeSet(apply_predicates(nodes, predicates, e_ctx)?))
        }
    }
}

/// Evaluates an expression expected to produce nodes.
pub fn select_nodes(
    expr: &Expression,
    e_ctx: &EvaluationContext<'_>,
) -> Result<Vec<NodeId>, XPathError> {
    match evaluate(expr, e_ctx)? {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        other => Err(XPathError::TypeError(format!("Expected a node-set, found {:?}", other))),
    }
}

fn evaluate_location_path(
    path: &LocationPath,
    e_ctx: &EvaluationContext<'_>,
) -> Result<Vec<NodeId>, XPathError> {
    let mut current = if let Some(start) = &path.start_point {
        match evaluate(start, e_ctx)? {
            XPathValue::NodeSet(nodes) => nodes,
            other => {
                return Err(XPathError::TypeError(format!(
                    "Cannot apply a path step to {:?}",
                    other
                )));
            }
        }
    } else if path.is_absolute {
        vec![e_ctx.document.root()]
    } else {
        vec![e_ctx.context_node]
    };

    for step in &path.steps {
        current = evaluate_step(step, &current, e_ctx)?;
    }
    Ok(current)
}

/// Evaluates one step for every context node, then merges the results into document order.
fn evaluate_step(
    step: &Step,
    context_nodes: &[NodeId],
    e_ctx: &EvaluationContext<'_>,
) -> Result<Vec<NodeId>, XPathError> {
    let doc = e_ctx.document;
    let mut merged = Vec::new();
    for &node in context_nodes {
        let candidates: Vec<NodeId> = axes::collect(doc, step.axis, node)
            .into_iter()
            .filter(|&n| node_test_matches(doc, n, &step.node_test, step.axis))
            .collect();
        merged.extend(apply_predicates(candidates, &step.predicates, e_ctx)?);
    }
    merged.sort_unstable();
    merged.dedup();
    Ok(merged)
}

fn node_test_matches(doc: &XmlDocument, node: NodeId, test: &NodeTest, axis: Axis) -> bool {
    let principal = if axis == Axis::Attribute {
        NodeType::Attribute
    } else {
        NodeType::Element
    };
    match test {
        NodeTest::Wildcard => doc.node_type(node) == principal,
        NodeTest::PrefixWildcard(prefix) => {
            doc.node_type(node) == principal
                && doc.name(node).is_some_and(|q| q.prefix.as_deref() == Some(prefix.as_str()))
        }
        NodeTest::Name(wanted) => {
            doc.node_type(node) == principal
                && doc.name(node).is_some_and(|q| {
                    if wanted.contains(':') {
                        q.to_string() == *wanted
                    } else {
                        q.local_part == *wanted
                    }
                })
        }
        NodeTest::NodeType(ntt) => match ntt {
            NodeTypeTest::Node => true,
            NodeTypeTest::Text => doc.node_type(node) == NodeType::Text,
            NodeTypeTest::Comment => doc.node_type(node) == NodeType::Comment,
            NodeTypeTest::ProcessingInstruction(target) => {
                doc.node_type(node) == NodeType::ProcessingInstruction
                    && target
                        .as_ref()
                        .is_none_or(|t| doc.name(node).is_some_and(|q| q.to_string() == *t))
            }
        },
    }
}

/// Filters nodes, given in axis order, through each predicate in turn.
fn apply_predicates(
    mut nodes: Vec<NodeId>,
    predicates: &[Expression],
    e_ctx: &EvaluationContext<'_>,
) -> Result<Vec<NodeId>, XPathError> {
    for predicate in predicates {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (i, &node) in nodes.iter().enumerate() {
            let inner = e_ctx.at(node, i + 1, size);
            let keep = match evaluate(predicate, &inner)? {
                XPathValue::Number(n) => n == (i + 1) as f64,
                other => other.to_bool(),
            };
            if keep {
                kept.push(node);
            }
        }
        nodes = kept;
    }
    Ok(nodes)
}

// --- Operators ---

fn binary(
    op: BinaryOperator,
    l: XPathValue,
    r: XPathValue,
    doc: &XmlDocument,
) -> Result<XPathValue, XPathError> {
    use BinaryOperator::*;
    Ok(match op {
        Union => match (l, r) {
            (XPathValue::NodeSet(mut a), XPathValue::NodeSet(b)) => {
                a.extend(b);
                a.sort_unstable();
                a.dedup();
                XPathValue::NodeSet(a)
            }
            _ => return Err(XPathError::TypeError("'|' needs node-sets on both sides".to_string())),
        },
        Plus | Minus | Multiply | Divide | Modulo => {
            let (a, b) = (l.to_number(doc), r.to_number(doc));
            XPathValue::Number(match op {
                Plus => a + b,
                Minus => a - b,
                Multiply => a * b,
                Divide => a / b,
                _ => a % b,
            })
        }
        Equals | NotEquals | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            XPathValue::Boolean(compare(op, &l, &r, doc))
        }
        And => XPathValue::Boolean(l.to_bool() && r.to_bool()),
        Or => XPathValue::Boolean(l.to_bool() || r.to_bool()),
    })
}

/// Comparison with XPath's existential semantics for node-sets.
fn compare(op: BinaryOperator, l: &XPathValue, r: &XPathValue, doc: &XmlDocument) -> bool {
    match (l, r) {
        (XPathValue::NodeSet(a), XPathValue::NodeSet(b)) => a.iter().any(|&x| {
            let sx = XPathValue::String(doc.string_value(x));
            b.iter()
                .any(|&y| compare_atomic(op, &sx, &XPathValue::String(doc.string_value(y)), doc))
        }),
        (XPathValue::NodeSet(nodes), XPathValue::Boolean(_))
        | (XPathValue::Boolean(_), XPathValue::NodeSet(nodes)) => {
            let as_bool = XPathValue::Boolean(!nodes.is_empty());
            if matches!(l, XPathValue::NodeSet(_)) {
                compare_atomic(op, &as_bool, r, doc)
            } else {
                compare_atomic(op, l, &as_bool, doc)
            }
        }
        (XPathValue::NodeSet(nodes), other) => nodes
            .iter()
            .any(|&n| compare_atomic(op, &XPathValue::String(doc.string_value(n)), other, doc)),
        (other, XPathValue::NodeSet(nodes)) => nodes
            .iter()
            .any(|&n| compare_atomic(op, other, &XPathValue::String(doc.string_value(n)), doc)),
        _ => compare_atomic(op, l, r, doc),
    }
}

fn compare_atomic(op: BinaryOperator, l: &XPathValue, r: &XPathValue, doc: &XmlDocument) -> bool {
    use BinaryOperator::*;
    match op {
        Equals | NotEquals => {
            let equal = match (l, r) {
                (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
                    l.to_bool() == r.to_bool()
                }
                (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
                    l.to_number(doc) == r.to_number(doc)
                }
                _ => l.to_string_value(doc) == r.to_string_value(doc),
            };
            if op == Equals { equal } else { !equal }
        }
        _ => {
            let (a, b) = (l.to_number(doc), r.to_number(doc));
            match op {
                LessThan => a < b,
                LessThanOrEqual => a <= b,
                GreaterThan => a > b,
                _ => a >= b,
            }
        }
    }
}
