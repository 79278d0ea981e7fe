//! Namespace alias rewriting and deferred declarations.
//!
//! A declaration made inside an open element is held against that element until
//! its prefix is used somewhere in the element's subtree, at which point it is
//! flushed. Declarations still pending when the element closes are dropped if the
//! prefix is excluded and flushed otherwise. The tracker only decides; the caller
//! writes each returned [`Flush`] to the output.
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// The name used in configuration for the unprefixed namespace.
pub const DEFAULT_PREFIX_NAME: &str = "#default";

/// A declaration to write onto the open element at `depth` (1 = outermost).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub depth: usize,
    pub prefix: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Pending {
    /// The prefix as the caller wrote it, before aliasing.
    declared: String,
    uri: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingScope {
    depth: usize,
    /// Keyed by effective prefix.
    pending: IndexMap<String, Pending>,
    /// Effective prefixes used so far in this element's subtree.
    used: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceTracker {
    aliases: HashMap<String, String>,
    excluded: HashSet<String>,
    scopes: Vec<PendingScope>,
}

fn normalize(prefix: &str) -> &str {
    if prefix == DEFAULT_PREFIX_NAME { "" } else { prefix }
}

fn split_qname(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", name),
    }
}

impl NamespaceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rewrite from `declared` to `effective`. `""` or `#default` is the unprefixed
    /// namespace.
    pub fn alias(&mut self, declared: &str, effective: &str) {
        self.aliases
            .insert(normalize(declared).to_string(), normalize(effective).to_string());
    }

    /// Adds prefixes to the exclusion set. Earlier exclusions stay in force.
    pub fn exclude<I, S>(&mut self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for prefix in prefixes {
            self.excluded.insert(normalize(prefix.as_ref()).to_string());
        }
    }

    pub fn is_excluded(&self, prefix: &str) -> bool {
        self.excluded.contains(normalize(prefix))
    }

    pub fn rewrite_prefix(&self, prefix: &str) -> String {
        let prefix = normalize(prefix);
        self.aliases.get(prefix).cloned().unwrap_or_else(|| prefix.to_string())
    }

    /// Applies the alias for a qualified name's prefix.
    pub fn rewrite_name(&self, name: &str) -> String {
        let (prefix, local) = split_qname(name);
        match self.rewrite_prefix(prefix).as_str() {
            "" => local.to_string(),
            effective => format!("{}:{}", effective, local),
        }
    }

    /// Starts tracking the element just opened at `depth`.
    pub fn open(&mut self, depth: usize) {
        self.scopes.push(PendingScope {
            depth,
            ..PendingScope::default()
        });
    }

    /// Records a declaration on the innermost open element. Returns a flush if the
    /// prefix has already been used within that element. `None` from the outer
    /// option means no element is open.
    pub fn declare(&mut self, prefix: &str, uri: &str) -> Option<Option<Flush>> {
        let effective = self.rewrite_prefix(prefix);
        let scope = self.scopes.last_mut()?;
        if scope.used.contains(&effective) {
            scope.pending.shift_remove(&effective);
            return Some(Some(Flush {
                depth: scope.depth,
                prefix: effective,
                uri: uri.to_string(),
            }));
        }
        scope.pending.insert(
            effective,
            Pending {
                declared: normalize(prefix).to_string(),
                uri: uri.to_string(),
            },
        );
        Some(None)
    }

    /// Marks the prefix of an already-rewritten element or attribute name as used.
    /// Attributes pass `attribute = true`: an unprefixed attribute is in no namespace.
    pub fn use_name(&mut self, name: &str, attribute: bool) -> Option<Flush> {
        let (prefix, _) = split_qname(name);
        if (attribute && prefix.is_empty()) || prefix == "xmlns" || name == "xmlns" {
            return None;
        }
        for scope in self.scopes.iter_mut() {
            scope.used.insert(prefix.to_string());
        }
        for scope in self.scopes.iter_mut().rev() {
            if let Some(pending) = scope.pending.shift_remove(prefix) {
                return Some(Flush {
                    depth: scope.depth,
                    prefix: prefix.to_string(),
                    uri: pending.uri,
                });
            }
        }
        None
    }

    /// Finishes the innermost element: unused excluded declarations are dropped, the rest flushed.
    pub fn close(&mut self) -> Vec<Flush> {
        let Some(scope) = self.scopes.pop() else {
            return Vec::new();
        };
        let depth = scope.depth;
        scope
            .pending
            .into_iter()
            .filter(|(effective, pending)| {
                let dropped =
                    self.excluded.contains(effective) || self.excluded.contains(&pending.declared);
                if dropped {
                    log::debug!("Dropping unused excluded namespace prefix '{}'", effective);
                }
                !dropped
            })
            .map(|(prefix, pending)| Flush {
                depth,
                prefix,
                uri: pending.uri,
            })
            .collect()
    }

    /// Detaches the open-element state for an independent sub-run.
    pub fn suspend(&mut self) -> Vec<PendingScope> {
        std::mem::take(&mut self.scopes)
    }

    pub fn resume(&mut self, scopes: Vec<PendingScope>) {
        self.scopes = scopes;
    }

    pub fn open_scopes(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flush(depth: usize, prefix: &str, uri: &str) -> Flush {
        Flush {
            depth,
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }

    #[test]
    fn test_use_in_descendant_flushes_on_declaring_element() {
        let mut ns = NamespaceTracker::new();
        ns.open(1);
        assert_eq!(ns.declare("x", "urn:x"), Some(None));
        ns.open(2);
        assert_eq!(ns.use_name("x:item", false), Some(flush(1, "x", "urn:x")));
        assert_eq!(ns.use_name("x:other", false), None);
        assert!(ns.close().is_empty());
        assert!(ns.close().is_empty());
    }

    #[test]
    fn test_declaration_after_use_flushes_immediately() {
        let mut ns = NamespaceTracker::new();
        ns.open(1);
        ns.use_name("x:root", false);
        assert_eq!(ns.declare("x", "urn:x"), Some(Some(flush(1, "x", "urn:x"))));
    }

    #[test]
    fn test_unused_excluded_prefix_is_dropped() {
        let mut ns = NamespaceTracker::new();
        ns.exclude(["ns"]);
        ns.exclude(["other"]);
        assert!(ns.is_excluded("ns"));
        ns.open(1);
        ns.declare("ns", "urn:ns");
        ns.declare("keep", "urn:keep");
        assert_eq!(ns.close(), vec![flush(1, "keep", "urn:keep")]);
    }

    #[test]
    fn test_sibling_use_does_not_flush() {
        let mut ns = NamespaceTracker::new();
        ns.exclude(["x"]);
        ns.open(1);
        ns.open(2);
        ns.declare("x", "urn:x");
        assert!(ns.close().is_empty());
        ns.open(2);
        assert_eq!(ns.use_name("x:b", false), None);
        ns.close();
        ns.close();
    }

    #[test]
    fn test_aliases_rewrite_names_and_declarations() {
        let mut ns = NamespaceTracker::new();
        ns.alias("axsl", "xsl");
        ns.alias("#default", "h");
        assert_eq!(ns.rewrite_name("axsl:template"), "xsl:template");
        assert_eq!(ns.rewrite_name("div"), "h:div");
        ns.open(1);
        ns.declare("axsl", "urn:xsl");
        assert_eq!(ns.use_name("xsl:template", false), Some(flush(1, "xsl", "urn:xsl")));
    }

    #[test]
    fn test_unprefixed_attributes_use_nothing() {
        let mut ns = NamespaceTracker::new();
        ns.exclude([DEFAULT_PREFIX_NAME]);
        ns.open(1);
        ns.declare("", "urn:default");
        assert_eq!(ns.use_name("id", true), None);
        assert!(ns.close().is_empty());
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut ns = NamespaceTracker::new();
        ns.open(1);
        ns.declare("x", "urn:x");
        let saved = ns.suspend();
        assert_eq!(ns.declare("y", "urn:y"), None);
        ns.resume(saved);
        assert_eq!(ns.open_scopes(), 1);
        assert_eq!(ns.use_name("x:a", false), Some(flush(1, "x", "urn:x")));
    }
}
