//! Built-in implementations of the core XPath functions.

use super::engine::{EvaluationContext, XPathValue};
use crate::error::XPathError;

/// Dispatches a function call to the correct implementation.
pub fn evaluate_function(
    name: &str,
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    let doc = e_ctx.document;
    let s = |v: &XPathValue| v.to_string_value(doc);
    let n = |v: &XPathValue| v.to_number(doc);
    // The string value of the single argument, or of the context node.
    let arg_or_context = |args: &[XPathValue]| match args.first() {
        Some(v) => s(v),
        None => doc.string_value(e_ctx.context_node),
    };

    let value = match name {
        // Node-set
        "position" => {
            arity(name, &args, 0, 0)?;
            XPathValue::Number(e_ctx.context_position as f64)
        }
        "last" => {
            arity(name, &args, 0, 0)?;
            XPathValue::Number(e_ctx.context_size as f64)
        }
        "count" => {
            arity(name, &args, 1, 1)?;
            XPathValue::Number(node_set(name, &args[0])?.len() as f64)
        }
        "name" | "local-name" => {
            arity(name, &args, 0, 1)?;
            let node = match args.first() {
                Some(v) => node_set(name, v)?.first().copied(),
                None => Some(e_ctx.context_node),
            };
            let q = node.and_then(|id| doc.name(id));
            XPathValue::String(match q {
                Some(q) if name == "name" => q.to_string(),
                Some(q) => q.local_part,
                None => String::new(),
            })
        }

        // String
        "string" => {
            arity(name, &args, 0, 1)?;
            XPathValue::String(arg_or_context(&args))
        }
        "concat" => {
            if args.len() < 2 {
                return Err(XPathError::function(name, "Expected at least 2 arguments"));
            }
            XPathValue::String(args.iter().map(s).collect())
        }
        "contains" => {
            arity(name, &args, 2, 2)?;
            XPathValue::Boolean(s(&args[0]).contains(&s(&args[1])))
        }
        "starts-with" => {
            arity(name, &args, 2, 2)?;
            XPathValue::Boolean(s(&args[0]).starts_with(&s(&args[1])))
        }
        "substring-before" => {
            arity(name, &args, 2, 2)?;
            let (hay, needle) = (s(&args[0]), s(&args[1]));
            XPathValue::String(hay.find(&needle).map(|i| hay[..i].to_string()).unwrap_or_default())
        }
        "substring-after" => {
            arity(name, &args, 2, 2)?;
            let (hay, needle) = (s(&args[0]), s(&args[1]));
            XPathValue::String(
                hay.find(&needle)
                    .map(|i| hay[i + needle.len()..].to_string())
                    .unwrap_or_default(),
            )
        }
        "substring" => {
            arity(name, &args, 2, 3)?;
            let chars: Vec<char> = s(&args[0]).chars().collect();
            let start = n(&args[1]).round();
            let end = match args.get(2) {
                Some(len) => start + n(len).round(),
                None => f64::INFINITY,
            };
            // 1-based positions p with start <= p < end.
            XPathValue::String(
                chars
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| {
                        let p = (*i + 1) as f64;
                        p >= start && p < end
                    })
                    .map(|(_, c)| c)
                    .collect(),
            )
        }
        "string-length" => {
            arity(name, &args, 0, 1)?;
            XPathValue::Number(arg_or_context(&args).chars().count() as f64)
        }
        "normalize-space" => {
            arity(name, &args, 0, 1)?;
            let text = arg_or_context(&args);
            XPathValue::String(text.split_whitespace().collect::<Vec<_>>().join(" "))
        }
        "translate" => {
            arity(name, &args, 3, 3)?;
            let from: Vec<char> = s(&args[1]).chars().collect();
            let to: Vec<char> = s(&args[2]).chars().collect();
            XPathValue::String(
                s(&args[0])
                    .chars()
                    .filter_map(|c| match from.iter().position(|&f| f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect(),
            )
        }

        // Boolean
        "not" => {
            arity(name, &args, 1, 1)?;
            XPathValue::Boolean(!args[0].to_bool())
        }
        "boolean" => {
            arity(name, &args, 1, 1)?;
            XPathValue::Boolean(args[0].to_bool())
        }
        "true" => {
            arity(name, &args, 0, 0)?;
            XPathValue::Boolean(true)
        }
        "false" => {
            arity(name, &args, 0, 0)?;
            XPathValue::Boolean(false)
        }

        // Number
        "number" => {
            arity(name, &args, 0, 1)?;
            XPathValue::Number(match args.first() {
                Some(v) => n(v),
                None => XPathValue::NodeSet(vec![e_ctx.context_node]).to_number(doc),
            })
        }
        "sum" => {
            arity(name, &args, 1, 1)?;
            let total = node_set(name, &args[0])?
                .iter()
                .map(|&id| XPathValue::String(doc.string_value(id)).to_number(doc))
                .sum();
            XPathValue::Number(total)
        }
        "floor" => {
            arity(name, &args, 1, 1)?;
            XPathValue::Number(n(&args[0]).floor())
        }
        "ceiling" => {
            arity(name, &args, 1, 1)?;
            XPathValue::Number(n(&args[0]).ceil())
        }
        "round" => {
            arity(name, &args, 1, 1)?;
            // Halves round towards positive infinity.
            XPathValue::Number((n(&args[0]) + 0.5).floor())
        }
        _ => return Err(XPathError::function(name, "Unknown XPath function")),
    };
    Ok(value)
}

fn arity(name: &str, args: &[XPathValue], min: usize, max: usize) -> Result<(), XPathError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(XPathError::function(
            name,
            format!("Expected {} argument(s), got {}", expected, args.len()),
        ));
    }
    Ok(())
}

fn node_set<'v>(name: &str, value: &'v XPathValue) -> Result<&'v [usize], XPathError> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        other => Err(XPathError::function(name, format!("Expected a node-set, got {:?}", other))),
    }
}
