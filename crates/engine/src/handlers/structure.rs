use crate::adapter::NodeAdapter;
use crate::context::{DispatchContext, PropertySet};
use crate::error::TransformError;
use serde_json::{Map, Value};

impl<A: NodeAdapter> DispatchContext<A> {
    /// Opens an object seeded with `seed`, runs `body` inside it, then appends the result.
    pub fn object<F>(&mut self, seed: Map<String, Value>, body: F) -> Result<(), TransformError>
    where
        F: FnOnce(&mut Self) -> Result<(), TransformError>,
    {
        self.joiner.start_object(seed)?;
        let result = body(self);
        let closed = self.joiner.end_object().map_err(TransformError::from);
        result.and(closed)
    }

    /// Like [`object`](Self::object), with the named property sets merged in under the seed.
    pub fn object_with_sets<F>(
        &mut self,
        seed: Map<String, Value>,
        use_sets: &[&str],
        body: F,
    ) -> Result<(), TransformError>
    where
        F: FnOnce(&mut Self) -> Result<(), TransformError>,
    {
        let mut merged = Map::new();
        for name in use_sets {
            merged.extend(self.property_set_values(name)?);
        }
        merged.extend(seed);
        self.object(merged, body)
    }

    pub fn array<F>(&mut self, seed: Vec<Value>, body: F) -> Result<(), TransformError>
    where
        F: FnOnce(&mut Self) -> Result<(), TransformError>,
    {
        self.joiner.start_array(seed)?;
        let result = body(self);
        let closed = self.joiner.end_array().map_err(TransformError::from);
        result.and(closed)
    }

    /// Defines a named property set. Sets listed in `use_sets` are merged first and
    /// `properties` override them. References are resolved when the set is used.
    pub fn property_set(&mut self, name: &str, properties: Map<String, Value>, use_sets: &[&str]) {
        self.property_sets.insert(
            name.to_string(),
            PropertySet {
                properties,
                use_sets: use_sets.iter().map(|s| s.to_string()).collect(),
            },
        );
    }

    /// The fully composed properties of a set.
    pub fn property_set_values(&self, name: &str) -> Result<Map<String, Value>, TransformError> {
        let mut chain = Vec::new();
        self.compose_property_set(name, &mut chain)
    }

    fn compose_property_set(
        &self,
        name: &str,
        chain: &mut Vec<String>,
    ) -> Result<Map<String, Value>, TransformError> {
        if chain.iter().any(|n| n == name) {
            chain.push(name.to_string());
            return Err(TransformError::CircularPropertySet(chain.join(" -> ")));
        }
        let set = self
            .property_sets
            .get(name)
            .ok_or_else(|| TransformError::UnknownPropertySet(name.to_string()))?;
        chain.push(name.to_string());
        let mut composed = Map::new();
        for used in &set.use_sets {
            composed.extend(self.compose_property_set(used, chain)?);
        }
        composed.extend(set.properties.clone());
        chain.pop();
        Ok(composed)
    }
}
