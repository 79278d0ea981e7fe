//! Absolute positions of values inside a JSON document.
use serde_json::Value;
use std::fmt;

/// One hop from a container to one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

/// The chain of hops from the document root to a value.
///
/// Renders as a normalized path, e.g. `$['orders'][1]['id']`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location(Vec<PathStep>);

impl Location {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, step: PathStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }

    pub fn key(&self, key: &str) -> Self {
        self.child(PathStep::Key(key.to_string()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.child(PathStep::Index(index))
    }

    /// The location of the containing value, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The last hop, i.e. the slot this value occupies in its parent.
    pub fn last(&self) -> Option<&PathStep> {
        self.0.last()
    }

    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |current, step| match step {
            PathStep::Key(key) => current.as_object()?.get(key),
            PathStep::Index(index) => current.as_array()?.get(*index),
        })
    }

    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(root, |current, step| match step {
            PathStep::Key(key) => current.as_object_mut()?.get_mut(key),
            PathStep::Index(index) => current.as_array_mut()?.get_mut(*index),
        })
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(key) => {
                write!(f, "['{}']", key.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            PathStep::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for step in &self.0 {
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_normalized_path() {
        let loc = Location::root().key("orders").index(1).key("it's");
        assert_eq!(loc.to_string(), "$['orders'][1]['it\\'s']");
        assert_eq!(Location::root().to_string(), "$");
    }

    #[test]
    fn test_resolve_and_parent() {
        let data = json!({ "a": [ { "b": 7 } ] });
        let loc = Location::root().key("a").index(0).key("b");
        assert_eq!(loc.resolve(&data), Some(&json!(7)));
        assert_eq!(loc.parent().unwrap().resolve(&data), Some(&json!({ "b": 7 })));
        assert!(Location::root().key("missing").resolve(&data).is_none());
    }

    #[test]
    fn test_resolve_mut_replaces_in_place() {
        let mut data = json!({ "a": [1, 2] });
        let loc = Location::root().key("a").index(1);
        *loc.resolve_mut(&mut data).unwrap() = json!("two");
        assert_eq!(data, json!({ "a": [1, "two"] }));
    }
}
