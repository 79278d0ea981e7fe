// Entry points that assemble a dispatch context over a JSON document
use crate::adapter::JsonAdapter;
use serde_json::Value;
use stencil_engine::{
    DispatchContext, JoiningTransformer, JsonJoiner, Output, RuleDeclaration, TransformError,
    TransformOptions,
};

/// A rule set and its options, ready to run over JSON input.
pub struct JsonProcessor {
    rules: Vec<RuleDeclaration<JsonAdapter>>,
    options: TransformOptions,
}

impl JsonProcessor {
    pub fn new(rules: Vec<RuleDeclaration<JsonAdapter>>) -> Self {
        Self {
            rules,
            options: TransformOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the dispatch context without running it, for callers that attach a
    /// logger or specificity function first.
    pub fn context(
        self,
        data: Value,
        joiner: Box<dyn JoiningTransformer>,
    ) -> Result<DispatchContext<JsonAdapter>, TransformError> {
        DispatchContext::new(JsonAdapter::new(data), self.rules, joiner, self.options)
    }

    /// Runs over `data` into a [`JsonJoiner`].
    pub fn transform(self, data: Value) -> Result<Output, TransformError> {
        self.transform_into(data, Box::new(JsonJoiner::new()))
    }

    pub fn transform_into(
        self,
        data: Value,
        joiner: Box<dyn JoiningTransformer>,
    ) -> Result<Output, TransformError> {
        self.context(data, joiner)?.transform(None)
    }

    /// Parses `source` as JSON, then runs over it into `joiner`.
    pub fn transform_str(
        self,
        source: &str,
        joiner: Box<dyn JoiningTransformer>,
    ) -> Result<Output, TransformError> {
        let data: Value = serde_json::from_str(source)
            .map_err(|e| TransformError::InvalidInput(format!("JSON parse error: {}", e)))?;
        self.transform_into(data, joiner)
    }
}
