//! Dispatch context operations, one concern per file.

pub(crate) mod apply_templates;
pub(crate) mod call_template;
pub(crate) mod data;
pub(crate) mod documents;
pub(crate) mod for_each;
pub(crate) mod grouping;
pub(crate) mod markup;
pub(crate) mod structure;
