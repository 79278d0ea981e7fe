use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JoinError {
    #[error("Value not supported outside permissive mode: {0}")]
    UnsupportedValueInMode(String),

    #[error("No open element to receive {0}")]
    InvalidAttributeTarget(String),

    #[error("Cannot append to the current output position: {0}")]
    AppendToNonContainer(String),

    #[error("Missing property key: {0}")]
    MissingPropertyKey(String),

    #[error("Unbalanced output scope: {0}")]
    UnbalancedScope(String),

    #[error("Serialization failed: {0}")]
    Write(String),
}

impl From<std::io::Error> for JoinError {
    fn from(e: std::io::Error) -> Self {
        JoinError::Write(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for JoinError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        JoinError::Write(e.to_string())
    }
}
