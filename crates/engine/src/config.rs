//! Run-wide options for a transformation.
use crate::error::TransformError;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformOptions {
    /// Fail instead of picking the last-declared rule when the top priority is tied.
    pub error_on_equal_priority: bool,
    /// Refuse selectors that would evaluate filter expressions.
    pub prevent_eval: bool,
    /// The mode `transform` starts in when none is passed.
    pub mode: Option<String>,
    /// Prefixes whose unused declarations are dropped. `#default` names the unprefixed namespace.
    pub exclude_result_prefixes: Vec<String>,
    /// Lets non-finite numbers and undefined values through the primitive emitters.
    pub permissive: bool,
}

impl TransformOptions {
    pub fn from_json_str(text: &str) -> Result<Self, TransformError> {
        serde_json::from_str(text).map_err(|e| TransformError::Config(e.to_string()))
    }

    pub fn strict() -> Self {
        Self {
            error_on_equal_priority: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_str_defaults_missing_fields() {
        let source =
            r##"{ "errorOnEqualPriority": true, "excludeResultPrefixes": ["ns", "#default"] }"##;
        let options = TransformOptions::from_json_str(source).unwrap();
        assert!(options.error_on_equal_priority);
        assert!(!options.prevent_eval);
        assert_eq!(options.mode, None);
        assert_eq!(options.exclude_result_prefixes, vec!["ns", "#default"]);
    }

    #[test]
    fn test_from_json_str_rejects_bad_types() {
        let err = TransformOptions::from_json_str(r#"{ "permissive": "yes" }"#).unwrap_err();
        assert!(matches!(err, TransformError::Config(_)));
    }
}
