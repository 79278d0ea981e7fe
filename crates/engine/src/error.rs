use stencil_joiner::JoinError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Duplicate template name: '{0}'")]
    DuplicateTemplateName(String),

    #[error("Templates of equal priority {priority} match '{path}': {selectors}")]
    EqualPriorityTemplates {
        path: String,
        priority: f64,
        selectors: String,
    },

    #[error("Template not found: '{0}'")]
    TemplateNotFound(String),

    #[error("Value not supported outside permissive mode: {0}")]
    UnsupportedValueInMode(String),

    #[error("Invalid attribute target: {0}")]
    InvalidAttributeTarget(String),

    #[error("Cannot append to non-container: {0}")]
    AppendToNonContainer(String),

    #[error("Selector error in '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Invalid sort specification: {0}")]
    InvalidSortSpec(String),

    #[error("Invalid group specification: {0}")]
    InvalidGroupSpec(String),

    #[error("Unknown property set: '{0}'")]
    UnknownPropertySet(String),

    #[error("Circular property set reference: {0}")]
    CircularPropertySet(String),

    #[error("Unknown key: '{0}'")]
    UnknownKey(String),

    #[error("Cannot replace value at '{path}': {message}")]
    ReplaceFailed { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid input document: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Join(#[source] JoinError),
}

impl TransformError {
    pub fn selector(selector: &str, message: impl ToString) -> Self {
        TransformError::Selector {
            selector: selector.to_string(),
            message: message.to_string(),
        }
    }
}

/// Output failures that correspond to a dispatch-level kind keep that kind.
impl From<JoinError> for TransformError {
    fn from(e: JoinError) -> Self {
        match e {
            JoinError::UnsupportedValueInMode(msg) => TransformError::UnsupportedValueInMode(msg),
            JoinError::InvalidAttributeTarget(msg) => TransformError::InvalidAttributeTarget(msg),
            JoinError::AppendToNonContainer(msg) => TransformError::AppendToNonContainer(msg),
            other => TransformError::Join(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_errors_keep_their_kind() {
        let e: TransformError = JoinError::AppendToNonContainer("5".into()).into();
        assert_eq!(e, TransformError::AppendToNonContainer("5".into()));
        let e: TransformError = JoinError::UnbalancedScope("x".into()).into();
        assert!(matches!(e, TransformError::Join(JoinError::UnbalancedScope(_))));
    }

    #[test]
    fn test_display() {
        let e = TransformError::selector("$.[", "unexpected end");
        assert_eq!(e.to_string(), "Selector error in '$.[': unexpected end");
    }
}
