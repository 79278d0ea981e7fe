//! Rule-based transformation of JSON documents.
//!
//! Rule selectors and every selector passed to the dispatch operations are JSON
//! paths (see `stencil-jpath`). Matches are identified by their normalized path,
//! e.g. `$['orders'][0]['id']`; property-name selections end in `~`.

pub mod adapter;
pub mod processor;

pub use adapter::{JsonAdapter, JsonNode};
pub use processor::JsonProcessor;

/// The dispatch context specialized to JSON input.
pub type JsonContext = stencil_engine::DispatchContext<JsonAdapter>;
/// A rule over JSON input.
pub type JsonRule = stencil_engine::RuleDeclaration<JsonAdapter>;
