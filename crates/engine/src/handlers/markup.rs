use crate::adapter::NodeAdapter;
use crate::context::DispatchContext;
use crate::error::TransformError;
use crate::namespace::Flush;
use stencil_joiner::{CharacterMap, OutputConfig};

impl<A: NodeAdapter> DispatchContext<A> {
    /// Builds an element around `body`. Names are rewritten through the namespace
    /// aliases, and the element is closed even when `body` fails.
    pub fn element<F>(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        body: F,
    ) -> Result<(), TransformError>
    where
        F: FnOnce(&mut Self) -> Result<(), TransformError>,
    {
        let name = self.namespaces.rewrite_name(name);
        let attributes: Vec<(String, String)> = attributes
            .iter()
            .map(|(key, value)| (self.namespaces.rewrite_name(key), value.to_string()))
            .collect();

        self.joiner.start_element(&name, &attributes)?;
        self.namespaces.open(self.joiner.element_depth());

        let mut result = self.mark_used(&name, false);
        for (key, _) in &attributes {
            result = result.and_then(|_| self.mark_used(key, true));
        }
        let result = result.and_then(|_| body(self));

        let pending = self.namespaces.close();
        let flushed = self.write_flushes(pending);
        let closed = self.joiner.end_element().map_err(TransformError::from);
        result.and(flushed).and(closed)
    }

    pub fn attribute(&mut self, name: &str, value: &str) -> Result<(), TransformError> {
        let name = self.namespaces.rewrite_name(name);
        self.mark_used(&name, true)?;
        Ok(self.joiner.attribute(&name, value)?)
    }

    /// Declares a namespace on the innermost open element. The declaration is written
    /// once its prefix is used in the element's subtree, or when the element closes
    /// unless the prefix is excluded.
    pub fn namespace(&mut self, prefix: &str, uri: &str) -> Result<(), TransformError> {
        match self.namespaces.declare(prefix, uri) {
            None => Err(TransformError::InvalidAttributeTarget(format!(
                "namespace '{}' declared outside an element",
                prefix
            ))),
            Some(Some(flush)) => self.write_flushes(vec![flush]),
            Some(None) => Ok(()),
        }
    }

    /// Rewrites `declared` to `effective` in later names and declarations.
    /// `""` or `#default` stands for the unprefixed namespace.
    pub fn namespace_alias(&mut self, declared: &str, effective: &str) {
        self.namespaces.alias(declared, effective);
    }

    /// Adds to the prefixes whose unused declarations are dropped.
    pub fn exclude_result_prefixes<I, S>(&mut self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.namespaces.exclude(prefixes);
    }

    pub fn text(&mut self, text: &str) -> Result<(), TransformError> {
        Ok(self.joiner.text(text)?)
    }

    pub fn comment(&mut self, text: &str) -> Result<(), TransformError> {
        Ok(self.joiner.comment(text)?)
    }

    pub fn processing_instruction(
        &mut self,
        target: &str,
        data: &str,
    ) -> Result<(), TransformError> {
        Ok(self.joiner.processing_instruction(target, data)?)
    }

    pub fn output(&mut self, config: OutputConfig) {
        self.joiner.output(config);
    }

    pub fn character_map<I, S>(&mut self, name: &str, pairs: I)
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        self.joiner.character_map(name, CharacterMap::new(pairs));
    }

    fn mark_used(&mut self, name: &str, attribute: bool) -> Result<(), TransformError> {
        match self.namespaces.use_name(name, attribute) {
            Some(flush) => self.write_flushes(vec![flush]),
            None => Ok(()),
        }
    }

    fn write_flushes(&mut self, flushes: Vec<Flush>) -> Result<(), TransformError> {
        for flush in flushes {
            self.joiner.namespace(flush.depth, &flush.prefix, &flush.uri)?;
        }
        Ok(())
    }
}
