//! A JSON-native path selector engine.
//!
//! Paths select values out of a `serde_json::Value` and report where each
//! selected value lives, so callers can compare matches by location and write
//! replacements back into the document.

pub mod ast;
pub mod engine;
pub mod error;
pub mod location;
mod parser;

// --- Public API ---
pub use ast::{JsonPath, Origin, Segment, Selector, Terminal};
pub use engine::{EvalOptions, EvaluationContext, Selected, children_of, is_truthy, select};
pub use error::JPathError;
pub use location::{Location, PathStep};
pub use parser::parse_path;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_select_simple_path() {
        let path = parse_path("customer.name").unwrap();
        let data = json!({ "customer": { "name": "ACME" } });
        let found = select(&path, &EvaluationContext::new(&data)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, &json!("ACME"));
    }

    #[test]
    fn test_parse_and_select_path_with_index() {
        let path = parse_path("orders[1].id").unwrap();
        let data = json!({ "orders": [ { "id": "A" }, { "id": "B" } ] });
        let found = select(&path, &EvaluationContext::new(&data)).unwrap();
        assert_eq!(found[0].value, &json!("B"));
        assert_eq!(found[0].location.to_string(), "$['orders'][1]['id']");
    }

    #[test]
    fn test_current_context_selection() {
        let path = parse_path(".").unwrap();
        let data = json!("current value");
        let found = select(&path, &EvaluationContext::new(&data)).unwrap();
        assert_eq!(found[0].value, &data);
        assert!(found[0].location.is_root());
    }

    #[test]
    fn test_terminal_classification() {
        assert_eq!(parse_path("$.a.b").unwrap().terminal(), Terminal::Named);
        assert_eq!(parse_path("$.a.*").unwrap().terminal(), Terminal::Wildcard);
        assert_eq!(parse_path("$.a[0]").unwrap().terminal(), Terminal::Predicate);
        assert_eq!(parse_path("$.a[?(@.x)]").unwrap().terminal(), Terminal::Predicate);
        assert!(parse_path("$").unwrap().is_root());
    }
}
