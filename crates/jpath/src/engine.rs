//! The evaluation engine for executing a parsed JSON path against a `serde_json::Value`.

use super::ast::{CompareOp, FilterExpr, JsonPath, Operand, Origin, Segment, Selector};
use crate::error::JPathError;
use crate::location::Location;
use serde_json::Value;
use std::cmp::Ordering;

/// A value selected by a path, together with where it lives in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Selected<'a> {
    pub value: &'a Value,
    pub location: Location,
}

/// Settings that apply to every evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalOptions {
    /// Rejects paths containing `[?(...)]` filters.
    pub prevent_filters: bool,
}

/// The document and the node that relative paths start from.
pub struct EvaluationContext<'a> {
    pub root: &'a Value,
    pub context_node: &'a Value,
    pub context_location: Location,
    pub options: EvalOptions,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            context_node: root,
            context_location: Location::root(),
            options: EvalOptions::default(),
        }
    }

    pub fn at(root: &'a Value, context_node: &'a Value, context_location: Location) -> Self {
        Self {
            root,
            context_node,
            context_location,
            options: EvalOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }
}

/// Evaluates a path and returns every selected value in document order.
///
/// A trailing `~` is not applied here; callers expand the returned containers into
/// their key names.
pub fn select<'a>(
    path: &JsonPath,
    e_ctx: &EvaluationContext<'a>,
) -> Result<Vec<Selected<'a>>, JPathError> {
    if e_ctx.options.prevent_filters && path.uses_filters() {
        return Err(JPathError::FilterDisabled(format!("{:?}", path.segments)));
    }
    Ok(select_unchecked(path, e_ctx))
}

fn select_unchecked<'a>(path: &JsonPath, e_ctx: &EvaluationContext<'a>) -> Vec<Selected<'a>> {
    let start = match path.origin {
        Origin::Root => Selected {
            value: e_ctx.root,
            location: Location::root(),
        },
        Origin::Current => Selected {
            value: e_ctx.context_node,
            location: e_ctx.context_location.clone(),
        },
    };

    let mut current = vec![start];
    for segment in &path.segments {
        let mut next = Vec::new();
        for node in &current {
            match segment {
                Segment::Child(selector) => apply_selector(selector, node, e_ctx, &mut next),
                Segment::Descendant(selector) => {
                    for descendant in descendants_or_self(node) {
                        apply_selector(selector, &descendant, e_ctx, &mut next);
                    }
                }
                Segment::TypeTest(json_type) => {
                    if json_type.accepts(node.value) {
                        next.push(node.clone());
                    }
                }
            }
        }
        current = next;
    }
    current
}

/// Pre-order walk: the node itself, then every descendant.
fn descendants_or_self<'a>(node: &Selected<'a>) -> Vec<Selected<'a>> {
    let mut out = vec![node.clone()];
    let mut index = 0;
    while index < out.len() {
        let children = children_of(&out[index]);
        // Splice children right after their parent to keep document order.
        let insert_at = index + 1;
        out.splice(insert_at..insert_at, children);
        index += 1;
    }
    out
}

/// The members of an object or array, in document order.
pub fn children_of<'a>(node: &Selected<'a>) -> Vec<Selected<'a>> {
    match node.value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Selected {
                value: v,
                location: node.location.key(k),
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| Selected {
                value: v,
                location: node.location.index(i),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn apply_selector<'a>(
    selector: &Selector,
    node: &Selected<'a>,
    e_ctx: &EvaluationContext<'a>,
    out: &mut Vec<Selected<'a>>,
) {
    match selector {
        Selector::Name(name) => match node.value {
            Value::Object(map) => {
                if let Some(v) = map.get(name) {
                    out.push(Selected {
                        value: v,
                        location: node.location.key(name),
                    });
                }
            }
            Value::Array(_) => {
                if let Ok(index) = name.parse::<i64>() {
                    apply_selector(&Selector::Index(index), node, e_ctx, out);
                }
            }
            _ => {}
        },
        Selector::Index(index) => {
            if let Value::Array(items) = node.value {
                if let Some(i) = normalize_index(*index, items.len()) {
                    out.push(Selected {
                        value: &items[i],
                        location: node.location.index(i),
                    });
                }
            }
        }
        Selector::Wildcard => out.extend(children_of(node)),
        Selector::Slice { start, end, step } => {
            if let Value::Array(items) = node.value {
                for i in slice_indices(items.len(), *start, *end, *step) {
                    out.push(Selected {
                        value: &items[i],
                        location: node.location.index(i),
                    });
                }
            }
        }
        Selector::Union(selectors) => {
            for sel in selectors {
                apply_selector(sel, node, e_ctx, out);
            }
        }
        Selector::Filter(expr) => {
            for child in children_of(node) {
                if filter_matches(expr, &child, e_ctx) {
                    out.push(child);
                }
            }
        }
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn slice_indices(
    len: usize,
    start: Option<i64>,
    end: Option<i64>,
    step: Option<i64>,
) -> Vec<usize> {
    let len = len as i64;
    let step = step.unwrap_or(1);
    if step == 0 {
        return Vec::new();
    }
    let clamp = |v: i64, lo: i64, hi: i64| v.max(lo).min(hi);
    let norm = |v: i64| if v < 0 { len + v } else { v };
    let mut out = Vec::new();
    if step > 0 {
        let mut i = clamp(norm(start.unwrap_or(0)), 0, len);
        let stop = clamp(norm(end.unwrap_or(len)), 0, len);
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        let mut i = clamp(norm(start.unwrap_or(len - 1)), -1, len - 1);
        let stop = clamp(end.map(norm).unwrap_or(-1), -1, len - 1);
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    out
}

// --- Filters ---

fn filter_matches(
    expr: &FilterExpr,
    current: &Selected<'_>,
    e_ctx: &EvaluationContext<'_>,
) -> bool {
    match expr {
        FilterExpr::Or(a, b) => {
            filter_matches(a, current, e_ctx) || filter_matches(b, current, e_ctx)
        }
        FilterExpr::And(a, b) => {
            filter_matches(a, current, e_ctx) && filter_matches(b, current, e_ctx)
        }
        FilterExpr::Not(inner) => !filter_matches(inner, current, e_ctx),
        FilterExpr::Exists(operand) => match operand {
            Operand::Literal(v) => is_truthy(v),
            Operand::Path(_) => {
                operand_value(operand, current, e_ctx).is_some_and(|v| is_truthy(&v))
            }
        },
        FilterExpr::Compare { left, op, right } => {
            let l = operand_value(left, current, e_ctx);
            let r = operand_value(right, current, e_ctx);
            compare(l.as_ref(), *op, r.as_ref())
        }
    }
}

fn operand_value(
    operand: &Operand,
    current: &Selected<'_>,
    e_ctx: &EvaluationContext<'_>,
) -> Option<Value> {
    match operand {
        Operand::Literal(v) => Some(v.clone()),
        Operand::Path(path) => {
            let inner_ctx = EvaluationContext {
                root: e_ctx.root,
                context_node: current.value,
                context_location: current.location.clone(),
                options: e_ctx.options,
            };
            select_unchecked(path, &inner_ctx)
                .into_iter()
                .next()
                .map(|s| s.value.clone())
        }
    }
}

fn compare(left: Option<&Value>, op: CompareOp, right: Option<&Value>) -> bool {
    let (l, r) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        // A missing operand only satisfies "not equal".
        _ => return op == CompareOp::NotEquals && left.is_some() != right.is_some(),
    };
    let ordering = match (l, r) {
        (Value::Number(a), Value::Number(b)) => {
            a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b))
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match op {
        CompareOp::Equals => ordering.map_or(l == r, |o| o == Ordering::Equal),
        CompareOp::NotEquals => ordering.map_or(l != r, |o| o != Ordering::Equal),
        CompareOp::LessThan => ordering == Some(Ordering::Less),
        CompareOp::LessThanOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::GreaterThan => ordering == Some(Ordering::Greater),
        CompareOp::GreaterThanOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
    }
}

/// JavaScript-style truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_path;
    use serde_json::json;

    fn paths(expr: &str, data: &Value) -> Vec<String> {
        let path = parse_path(expr).unwrap();
        select(&path, &EvaluationContext::new(data))
            .unwrap()
            .into_iter()
            .map(|s| s.location.to_string())
            .collect()
    }

    #[test]
    fn test_wildcard_preserves_insertion_order() {
        let data = json!({ "z": 1, "a": 2, "m": 3 });
        assert_eq!(paths("$.*", &data), vec!["$['z']", "$['a']", "$['m']"]);
    }

    #[test]
    fn test_recursive_descent_visits_levels_in_order() {
        let data = json!({ "a": { "b": { "c": 1 } }, "d": 2 });
        assert_eq!(
            paths("$..*", &data),
            vec!["$['a']", "$['d']", "$['a']['b']", "$['a']['b']['c']"]
        );
        assert_eq!(paths("$..c", &data), vec!["$['a']['b']['c']"]);
    }

    #[test]
    fn test_indices_and_slices() {
        let data = json!({ "xs": [10, 20, 30, 40] });
        assert_eq!(paths("$.xs[-1]", &data), vec!["$['xs'][3]"]);
        assert_eq!(paths("$.xs[1:3]", &data), vec!["$['xs'][1]", "$['xs'][2]"]);
        assert_eq!(paths("$.xs[::-2]", &data), vec!["$['xs'][3]", "$['xs'][1]"]);
        assert_eq!(paths("$.xs[0,2]", &data), vec!["$['xs'][0]", "$['xs'][2]"]);
    }

    #[test]
    fn test_filters() {
        let data = json!({ "items": [
            { "name": "a", "price": 5 },
            { "name": "b", "price": 15 },
            { "name": "c" }
        ]});
        assert_eq!(paths("$.items[?(@.price < 10)]", &data), vec!["$['items'][0]"]);
        assert_eq!(
            paths("$.items[?(@.price)]", &data),
            vec!["$['items'][0]", "$['items'][1]"]
        );
        assert_eq!(paths("$.items[?(!@.price)]", &data), vec!["$['items'][2]"]);
        assert_eq!(
            paths("$.items[?(@.name == 'b' || @.name == 'c')]", &data),
            vec!["$['items'][1]", "$['items'][2]"]
        );
    }

    #[test]
    fn test_filters_can_be_prevented() {
        let data = json!({ "items": [1] });
        let path = parse_path("$.items[?(@ > 0)]").unwrap();
        let e_ctx = EvaluationContext::new(&data).with_options(EvalOptions {
            prevent_filters: true,
        });
        assert!(matches!(select(&path, &e_ctx), Err(JPathError::FilterDisabled(_))));
    }

    #[test]
    fn test_relative_evaluation_keeps_absolute_locations() {
        let data = json!({ "a": { "b": [ { "c": true } ] } });
        let ctx_loc = Location::root().key("a");
        let ctx_node = ctx_loc.resolve(&data).unwrap();
        let e_ctx = EvaluationContext::at(&data, ctx_node, ctx_loc);
        let path = parse_path("b[0].c").unwrap();
        let found = select(&path, &e_ctx).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location.to_string(), "$['a']['b'][0]['c']");
        assert_eq!(found[0].value, &json!(true));
    }

    #[test]
    fn test_type_tests() {
        let data = json!({ "a": "x", "b": 1, "c": [true] });
        assert_eq!(paths("$..*@string()", &data), vec!["$['a']"]);
        assert_eq!(paths("$..*@scalar()", &data), vec!["$['a']", "$['b']", "$['c'][0]"]);
    }
}
