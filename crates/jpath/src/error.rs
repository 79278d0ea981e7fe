use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JPathError {
    #[error("JSON path parse error in '{0}': {1}")]
    JPathParse(String, String),

    #[error("Filter expressions are disabled: '{0}'")]
    FilterDisabled(String),

    #[error("Type error: {0}")]
    TypeError(String),
}
