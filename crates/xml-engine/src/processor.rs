// Entry points that assemble a dispatch context over an XML document
use crate::adapter::XmlAdapter;
use stencil_engine::{
    DispatchContext, JoiningTransformer, Output, RuleDeclaration, StringJoiner, TransformError,
    TransformOptions,
};
use stencil_xpath::{ParseOptions, XmlDocument};

/// A rule set and its options, ready to run over XML input.
pub struct XmlProcessor {
    rules: Vec<RuleDeclaration<XmlAdapter>>,
    options: TransformOptions,
    parse_options: ParseOptions,
}

impl XmlProcessor {
    pub fn new(rules: Vec<RuleDeclaration<XmlAdapter>>) -> Self {
        Self {
            rules,
            options: TransformOptions::default(),
            parse_options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    /// Controls how [`transform_str`](Self::transform_str) parses its source.
    pub fn with_parse_options(mut self, parse_options: ParseOptions) -> Self {
        self.parse_options = parse_options;
        self
    }

    pub fn context(
        self,
        document: XmlDocument,
        joiner: Box<dyn JoiningTransformer>,
    ) -> Result<DispatchContext<XmlAdapter>, TransformError> {
        DispatchContext::new(XmlAdapter::new(document), self.rules, joiner, self.options)
    }

    /// Runs over `document` into a [`StringJoiner`].
    pub fn transform(self, document: XmlDocument) -> Result<Output, TransformError> {
        self.transform_into(document, Box::new(StringJoiner::new()))
    }

    pub fn transform_into(
        self,
        document: XmlDocument,
        joiner: Box<dyn JoiningTransformer>,
    ) -> Result<Output, TransformError> {
        self.context(document, joiner)?.transform(None)
    }

    /// Parses `source` as XML, then runs over it into `joiner`.
    pub fn transform_str(
        self,
        source: &str,
        joiner: Box<dyn JoiningTransformer>,
    ) -> Result<Output, TransformError> {
        let document = XmlDocument::parse_with_options(source, self.parse_options)
            .map_err(|e| TransformError::InvalidInput(e.to_string()))?;
        self.transform_into(document, joiner)
    }
}
