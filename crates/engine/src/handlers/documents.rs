use crate::adapter::NodeAdapter;
use crate::context::DispatchContext;
use crate::error::TransformError;
use indexmap::IndexMap;
use stencil_joiner::{JoiningTransformer, Output};

impl<A: NodeAdapter> DispatchContext<A> {
    /// Runs `body` with `document` as the input. Navigation, rule caches, key indexes
    /// and pending namespaces belong to the outer run and are restored afterwards.
    pub fn document<F>(&mut self, document: A::Document, body: F) -> Result<(), TransformError>
    where
        F: FnOnce(&mut Self) -> Result<(), TransformError>,
    {
        let previous = self.adapter.swap_document(document);
        let root = self.adapter.root();
        let saved_current = std::mem::replace(&mut self.current, root);
        let saved_started = std::mem::replace(&mut self.started, false);
        let saved_patterns = std::mem::take(&mut self.patterns);
        let saved_keys = std::mem::take(&mut self.key_indexes);
        let saved_namespaces = self.namespaces.suspend();
        self.variables.push();

        let result = body(self);

        self.variables.pop();
        self.namespaces.resume(saved_namespaces);
        self.key_indexes = saved_keys;
        self.patterns = saved_patterns;
        self.started = saved_started;
        self.current = saved_current;
        self.adapter.swap_document(previous);
        result
    }

    /// Builds a secondary output with `joiner` and stores it under `href`.
    pub fn result_document<F>(
        &mut self,
        href: &str,
        mut joiner: Box<dyn JoiningTransformer>,
        body: F,
    ) -> Result<(), TransformError>
    where
        F: FnOnce(&mut Self) -> Result<(), TransformError>,
    {
        joiner.set_permissive(self.options.permissive);
        let previous = std::mem::replace(&mut self.joiner, joiner);
        let saved_namespaces = self.namespaces.suspend();

        let result = body(self);

        self.namespaces.resume(saved_namespaces);
        let mut finished = std::mem::replace(&mut self.joiner, previous);
        result?;
        let output = finished.get()?;
        log::debug!("Finished result document '{}'", href);
        self.result_documents.insert(href.to_string(), output);
        Ok(())
    }

    /// Hands over every result document built so far, in creation order.
    pub fn take_result_documents(&mut self) -> IndexMap<String, Output> {
        std::mem::take(&mut self.result_documents)
    }
}
