//! Rule-based tree transformation.
//!
//! A transformation is a list of rules, each pairing a selector with a body. A run
//! starts at the root of the input, picks the most specific rule for each node it
//! visits and lets the body write into a joining transformer: a string serializer,
//! a JSON builder or an XML document builder.
//!
//! The same dispatch engine drives two front ends:
//!
//! - [`json`] selects with JSON paths over `serde_json::Value` input.
//! - [`xml`] selects with XPath over an owned XML document.
//!
//! ```ignore
//! use stencil::prelude::*;
//! use serde_json::json;
//!
//! let rules = vec![JsonRule::new("$.a.b", |_: &mut JsonContext, _: &JsonNode, _: &RuleInfo| {
//!     Ok(Some(json!("hit")))
//! })];
//! let output = stencil::transform_json(rules, json!({ "a": { "b": 1 } }))?;
//! ```

pub use stencil_engine as engine;
pub use stencil_joiner as joiner;
pub use stencil_jpath as jpath;
pub use stencil_json as json;
pub use stencil_xml as xml;
pub use stencil_xpath as xpath;

pub use stencil_engine::{
    DispatchContext, GroupSpec, Match, NodeAdapter, Output, OutputConfig, Param, RuleDeclaration,
    RuleInfo, SortKey, SortSpec, TransformError, TransformOptions,
};

use serde_json::Value;

/// The names most rule sets need.
pub mod prelude {
    pub use stencil_engine::{
        DomJoiner, GroupSpec, JoiningTransformer, JsonJoiner, Output, OutputConfig, Param,
        ParamValue, RuleInfo, SortKey, SortSpec, StringJoiner, TransformError, TransformOptions,
    };
    pub use stencil_json::{JsonContext, JsonNode, JsonProcessor, JsonRule};
    pub use stencil_xml::{NodeId, XmlContext, XmlDocument, XmlProcessor, XmlRule};
}

/// Runs JSON rules over `data` and returns the built JSON value.
pub fn transform_json(rules: Vec<json::JsonRule>, data: Value) -> Result<Output, TransformError> {
    log::debug!("Running {} JSON rule(s)", rules.len());
    json::JsonProcessor::new(rules).transform(data)
}

/// Parses `source` as XML and runs the rules over it into a markup string.
pub fn transform_xml_str(rules: Vec<xml::XmlRule>, source: &str) -> Result<Output, TransformError> {
    log::debug!("Running {} XML rule(s)", rules.len());
    xml::XmlProcessor::new(rules).transform_str(source, Box::new(joiner::StringJoiner::new()))
}
