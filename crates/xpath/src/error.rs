use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("XPath parse error in '{0}': {1}")]
    XPathParse(String, String),

    #[error("Function '{function}' error: {message}")]
    FunctionError { function: String, message: String },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Variable '{0}' not found")]
    UnknownVariable(String),
}

impl XPathError {
    pub fn function(function: &str, message: impl Into<String>) -> Self {
        Self::FunctionError {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
