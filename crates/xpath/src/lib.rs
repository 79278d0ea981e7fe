//! An owned XML document model with an XPath 1.0 subset for selecting and matching nodes.
//!
//! Documents are parsed with `roxmltree` into an arena ([`XmlDocument`]) that the
//! caller owns, so nodes are plain ids that can be stored, compared and sorted
//! without borrowing the source text.

pub mod ast;
mod axes;
pub mod document;
pub mod engine;
pub mod error;
mod functions;
mod parser;

// --- Public API ---
pub use ast::{Expression, Terminal};
pub use document::{NodeId, NodeKind, NodeType, ParseOptions, QName, XmlDocument};
pub use engine::{
    EvaluationContext, XPathValue, evaluate, format_number, parse_number, select_nodes,
};
pub use error::XPathError;
pub use parser::parse_expression;
