//! The shared rule-dispatch engine.
//!
//! A [`DispatchContext`] walks an input tree through a [`NodeAdapter`], picks the
//! best [`RuleDeclaration`] for each node it visits and writes whatever the rule
//! bodies produce into a [`JoiningTransformer`]. Front ends differ only in their
//! adapter: the engine itself knows nothing about JSON paths or XPath.

pub mod adapter;
pub mod config;
pub mod context;
pub mod error;
pub mod group;
mod handlers;
pub mod logger;
pub mod namespace;
pub mod priority;
pub mod registry;
pub mod scope;
pub mod sort;

#[cfg(test)]
pub(crate) mod testing;

// --- Public API ---
pub use adapter::{Match, NodeAdapter, NodeShape, Slot};
pub use config::TransformOptions;
pub use context::DispatchContext;
pub use error::TransformError;
pub use group::{Group, GroupSpec};
pub use logger::{LogFacadeLogger, MessageLogger, NoopLogger};
pub use namespace::DEFAULT_PREFIX_NAME;
pub use priority::Terminal;
pub use registry::{RuleBody, RuleDeclaration, RuleInfo, RuleRegistry, TemplateRule};
pub use scope::{Param, ParamValue, Variables};
pub use sort::{
    Comparator, LocaleOptions, Sensitivity, SortKey, SortOrder, SortSpec, SortType, collate,
};
pub use stencil_joiner::{
    CharacterMap, DomJoiner, Escaping, JoinError, JoiningTransformer, JsonJoiner, Output,
    OutputConfig, OutputMethod, StringJoiner,
};
