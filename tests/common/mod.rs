#![allow(dead_code)]

use serde_json::{Value, json};
use stencil::prelude::*;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A markup serializer without the XML declaration, so assertions stay short.
pub fn bare_string_joiner() -> Box<StringJoiner> {
    Box::new(StringJoiner::with_config(OutputConfig {
        omit_xml_declaration: Some(true),
        ..Default::default()
    }))
}

pub fn json_of(output: Output) -> Value {
    match output {
        Output::Json(value) => value,
        other => panic!("Expected JSON output, got {:?}", other),
    }
}

pub fn text_of(output: Output) -> String {
    output.to_text().expect("output should render as text")
}

/// Staff records whose departments alternate Eng, Sales, Eng, Sales.
pub fn staff_json() -> Value {
    json!({ "staff": [
        { "name": "Ada", "department": "Eng" },
        { "name": "Bo", "department": "Sales" },
        { "name": "Cy", "department": "Eng" },
        { "name": "Di", "department": "Sales" }
    ]})
}

pub const STAFF_XML: &str = concat!(
    r#"<staff><p dept="Eng">Ada</p><p dept="Sales">Bo</p>"#,
    r#"<p dept="Eng">Cy</p><p dept="Sales">Di</p></staff>"#
);

pub fn values_json() -> Value {
    json!({ "items": [{ "v": 5 }, { "v": 2 }, { "v": 8 }] })
}

pub const VALUES_XML: &str = r#"<items><item v="5"/><item v="2"/><item v="8"/></items>"#;

/// A JSON rule body that returns a fixed value.
pub type RuleResult = Result<Option<Value>, TransformError>;

pub fn emit_json(value: Value) -> impl Fn(&mut JsonContext, &JsonNode, &RuleInfo) -> RuleResult {
    move |_, _, _| Ok(Some(value.clone()))
}

/// An XML rule body that returns a fixed value.
pub fn emit_xml(value: Value) -> impl Fn(&mut XmlContext, &NodeId, &RuleInfo) -> RuleResult {
    move |_, _, _| Ok(Some(value.clone()))
}
