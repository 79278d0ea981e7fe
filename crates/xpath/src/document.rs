//! An owned, arena-backed XML tree aligned with the XPath 1.0 data model.
//!
//! Node ids index into the arena. Documents produced by [`XmlDocument::parse`] or
//! [`XmlDocument::into_document_order`] number their nodes in document order, so
//! sorting ids sorts nodes.
use crate::error::XPathError;
use std::fmt;

pub type NodeId = usize;

/// A qualified name, consisting of an optional prefix and a local part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local_part: String,
}

impl QName {
    /// Splits `prefix:local` at the first colon.
    pub fn parse(name: &str) -> Self {
        match name.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() => Self {
                prefix: Some(prefix.to_string()),
                local_part: local.to_string(),
            },
            _ => Self {
                prefix: None,
                local_part: name.to_string(),
            },
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local_part),
            None => write!(f, "{}", self.local_part),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Element {
        name: QName,
        attributes: Vec<NodeId>,
        /// Namespace declarations made on this element, as `(prefix, uri)`; `""` is the default.
        namespaces: Vec<(String, String)>,
    },
    Attribute {
        name: QName,
        value: String,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Drops text nodes that contain only whitespace.
    pub strip_whitespace: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    nodes: Vec<NodeData>,
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// An empty document holding only its root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn parse(text: &str) -> Result<Self, XPathError> {
        Self::parse_with_options(text, ParseOptions::default())
    }

    pub fn parse_with_options(text: &str, options: ParseOptions) -> Result<Self, XPathError> {
        let parsing = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let source = roxmltree::Document::parse_with_options(text, parsing)
            .map_err(|e| XPathError::XmlParse(e.to_string()))?;
        let mut doc = Self::new();
        let root = doc.root();
        for child in source.root().children() {
            doc.import(root, child, options);
        }
        Ok(doc)
    }

    fn import(&mut self, parent: NodeId, node: roxmltree::Node<'_, '_>, options: ParseOptions) {
        match node.node_type() {
            roxmltree::NodeType::Element => {
                let tag = node.tag_name();
                let prefix = tag.namespace().and_then(|ns| node.lookup_prefix(ns));
                let id = self.append_element(
                    parent,
                    QName {
                        prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
                        local_part: tag.name().to_string(),
                    },
                );
                for (prefix, uri) in declared_namespaces(node) {
                    self.add_namespace(id, &prefix, &uri);
                }
                for attr in node.attributes() {
                    let prefix = attr.namespace().and_then(|ns| node.lookup_prefix(ns));
                    self.set_attribute(
                        id,
                        QName {
                            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
                            local_part: attr.name().to_string(),
                        },
                        attr.value(),
                    );
                }
                for child in node.children() {
                    self.import(id, child, options);
                }
            }
            roxmltree::NodeType::Text => {
                let text = node.text().unwrap_or_default();
                if !(options.strip_whitespace && text.trim().is_empty()) {
                    self.append_text(parent, text);
                }
            }
            roxmltree::NodeType::Comment => {
                self.append_comment(parent, node.text().unwrap_or_default());
            }
            roxmltree::NodeType::PI => {
                if let Some(pi) = node.pi() {
                    let data = pi.value.unwrap_or_default();
                    self.append_processing_instruction(parent, pi.target, data);
                }
            }
            roxmltree::NodeType::Root => {}
        }
    }

    // --- Navigation ---

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn node_type(&self, id: NodeId) -> NodeType {
        match self.nodes[id].kind {
            NodeKind::Root => NodeType::Root,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Attribute { .. } => NodeType::Attribute,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn namespaces(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id].kind {
            NodeKind::Element { namespaces, .. } => namespaces,
            _ => &[],
        }
    }

    /// The element or attribute name. For a processing instruction, its target.
    pub fn name(&self, id: NodeId) -> Option<QName> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => Some(name.clone()),
            NodeKind::ProcessingInstruction { target, .. } => Some(QName::parse(target)),
            _ => None,
        }
    }

    pub fn attribute_value(&self, element: NodeId, name: &str) -> Option<&str> {
        self.attributes(element).iter().find_map(|&attr| match &self.nodes[attr].kind {
            NodeKind::Attribute { name: n, value } if n.to_string() == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// The XPath string value of a node.
    pub fn string_value(&self, id: NodeId) -> String {
        match &self.nodes[id].kind {
            NodeKind::Root | NodeKind::Element { .. } => {
                let mut out = String::new();
                self.collect_text(id, &mut out);
                out
            }
            NodeKind::Attribute { value, .. } => value.clone(),
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone(),
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for &child in &self.nodes[id].children {
            match &self.nodes[child].kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element { .. } => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    /// Every node below `id` on the child axis, in document order, `id` itself excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev());
        }
        out
    }

    /// A stable, human-readable address such as `/catalog[1]/item[2]/@id`.
    pub fn path(&self, id: NodeId) -> String {
        let Some(parent) = self.nodes[id].parent else {
            return "/".to_string();
        };
        let prefix = if parent == self.root() {
            String::new()
        } else {
            self.path(parent)
        };
        let step = match &self.nodes[id].kind {
            NodeKind::Attribute { name, .. } => return format!("{}/@{}", prefix, name),
            NodeKind::Element { name, .. } => name.to_string(),
            NodeKind::Text(_) => "text()".to_string(),
            NodeKind::Comment(_) => "comment()".to_string(),
            NodeKind::ProcessingInstruction { .. } => "processing-instruction()".to_string(),
            NodeKind::Root => return "/".to_string(),
        };
        let position = self.nodes[parent]
            .children
            .iter()
            .take_while(|&&sibling| sibling != id)
            .filter(|&&sibling| self.same_step(sibling, id))
            .count()
            + 1;
        format!("{}/{}[{}]", prefix, step, position)
    }

    fn same_step(&self, a: NodeId, b: NodeId) -> bool {
        match (&self.nodes[a].kind, &self.nodes[b].kind) {
            (NodeKind::Element { name: x, .. }, NodeKind::Element { name: y, .. }) => x == y,
            (x, y) => std::mem::discriminant(x) == std::mem::discriminant(y),
        }
    }

    // --- Building ---

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        id
    }

    pub fn append_element(&mut self, parent: NodeId, name: QName) -> NodeId {
        let id = self.push(
            parent,
            NodeKind::Element {
                name,
                attributes: Vec::new(),
                namespaces: Vec::new(),
            },
        );
        self.nodes[parent].children.push(id);
        id
    }

    /// Adds or overwrites an attribute on an element. Returns `None` if `element` is not one.
    pub fn set_attribute(&mut self, element: NodeId, name: QName, value: &str) -> Option<NodeId> {
        let existing = self.attributes(element).iter().copied().find(|&attr| {
            matches!(&self.nodes[attr].kind, NodeKind::Attribute { name: n, .. } if *n == name)
        });
        if let Some(attr) = existing {
            if let NodeKind::Attribute { value: v, .. } = &mut self.nodes[attr].kind {
                *v = value.to_string();
            }
            return Some(attr);
        }
        if self.node_type(element) != NodeType::Element {
            return None;
        }
        let attr = self.push(
            element,
            NodeKind::Attribute {
                name,
                value: value.to_string(),
            },
        );
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[element].kind {
            attributes.push(attr);
        }
        Some(attr)
    }

    pub fn add_namespace(&mut self, element: NodeId, prefix: &str, uri: &str) {
        if let NodeKind::Element { namespaces, .. } = &mut self.nodes[element].kind {
            match namespaces.iter_mut().find(|(p, _)| p == prefix) {
                Some(entry) => entry.1 = uri.to_string(),
                None => namespaces.push((prefix.to_string(), uri.to_string())),
            }
        }
    }

    /// Appends text, merging with a directly preceding text sibling.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        if let Some(&last) = self.nodes[parent].children.last() {
            if let NodeKind::Text(existing) = &mut self.nodes[last].kind {
                existing.push_str(text);
                return last;
            }
        }
        let id = self.push(parent, NodeKind::Text(text.to_string()));
        self.nodes[parent].children.push(id);
        id
    }

    pub fn append_comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(parent, NodeKind::Comment(text.to_string()));
        self.nodes[parent].children.push(id);
        id
    }

    pub fn append_processing_instruction(
        &mut self,
        parent: NodeId,
        target: &str,
        data: &str,
    ) -> NodeId {
        let id = self.push(
            parent,
            NodeKind::ProcessingInstruction {
                target: target.to_string(),
                data: data.to_string(),
            },
        );
        self.nodes[parent].children.push(id);
        id
    }

    /// Overwrites the value of a node in place.
    ///
    /// Elements have their children replaced by a single text node; text, comment,
    /// attribute and processing-instruction nodes take the new value directly.
    pub fn replace_value(&mut self, id: NodeId, text: &str) {
        if matches!(self.node_type(id), NodeType::Root | NodeType::Element) {
            let old = std::mem::take(&mut self.nodes[id].children);
            for child in old {
                self.nodes[child].parent = None;
            }
            if !text.is_empty() {
                self.append_text(id, text);
            }
            return;
        }
        match &mut self.nodes[id].kind {
            NodeKind::Attribute { value, .. } => *value = text.to_string(),
            NodeKind::Text(value) | NodeKind::Comment(value) => *value = text.to_string(),
            NodeKind::ProcessingInstruction { data, .. } => *data = text.to_string(),
            NodeKind::Root | NodeKind::Element { .. } => {}
        }
    }

    /// Rebuilds the arena so ids follow document order and detached nodes are dropped.
    pub fn into_document_order(self) -> Self {
        let mut order = vec![self.root()];
        let mut stack = vec![self.root()];
        while let Some(current) = stack.pop() {
            if current != self.root() {
                order.push(current);
            }
            order.extend(self.attributes(current).iter().copied());
            stack.extend(self.nodes[current].children.iter().rev());
        }

        let mut remap = vec![usize::MAX; self.nodes.len()];
        for (new_id, &old_id) in order.iter().enumerate() {
            remap[old_id] = new_id;
        }
        let map_all = |ids: &[NodeId]| ids.iter().map(|&id| remap[id]).collect::<Vec<_>>();

        let nodes = order
            .iter()
            .map(|&old_id| {
                let data = &self.nodes[old_id];
                let kind = match &data.kind {
                    NodeKind::Element {
                        name,
                        attributes,
                        namespaces,
                    } => NodeKind::Element {
                        name: name.clone(),
                        attributes: map_all(attributes),
                        namespaces: namespaces.clone(),
                    },
                    other => other.clone(),
                };
                NodeData {
                    kind,
                    parent: data.parent.map(|p| remap[p]),
                    children: map_all(&data.children),
                }
            })
            .collect();
        Self { nodes }
    }
}

/// Namespaces declared on `node` itself rather than inherited from its parent.
fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> Vec<(String, String)> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    node.namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| (ns.name().unwrap_or_default().to_string(), ns.uri().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        r#"<catalog xmlns:x="urn:x"><item id="a">One</item><!--c-->"#,
        r#"<item id="b"><x:note>Two</x:note></item></catalog>"#
    );

    #[test]
    fn test_parse_structure_and_string_values() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let catalog = doc.children(doc.root())[0];
        assert_eq!(doc.name(catalog).unwrap().to_string(), "catalog");
        assert_eq!(doc.namespaces(catalog), &[("x".to_string(), "urn:x".to_string())]);
        let kids = doc.children(catalog);
        assert_eq!(kids.len(), 3);
        assert_eq!(doc.node_type(kids[1]), NodeType::Comment);
        assert_eq!(doc.string_value(catalog), "OneTwo");
        assert_eq!(doc.attribute_value(kids[2], "id"), Some("b"));
        let note = doc.children(kids[2])[0];
        assert_eq!(doc.name(note).unwrap().to_string(), "x:note");
    }

    #[test]
    fn test_paths() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let catalog = doc.children(doc.root())[0];
        let second = doc.children(catalog)[2];
        assert_eq!(doc.path(doc.root()), "/");
        assert_eq!(doc.path(catalog), "/catalog[1]");
        assert_eq!(doc.path(second), "/catalog[1]/item[2]");
        assert_eq!(doc.path(doc.attributes(second)[0]), "/catalog[1]/item[2]/@id");
        let first_text = doc.children(doc.children(catalog)[0])[0];
        assert_eq!(doc.path(first_text), "/catalog[1]/item[1]/text()[1]");
    }

    #[test]
    fn test_parsed_ids_follow_document_order() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let all = doc.descendants(doc.root());
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);
    }

    #[test]
    fn test_strip_whitespace() {
        let text = "<a>\n  <b/>\n</a>";
        let kept = XmlDocument::parse(text).unwrap();
        let options = ParseOptions { strip_whitespace: true };
        let stripped = XmlDocument::parse_with_options(text, options).unwrap();
        let a = |d: &XmlDocument| d.children(d.root())[0];
        assert_eq!(kept.children(a(&kept)).len(), 3);
        assert_eq!(stripped.children(a(&stripped)).len(), 1);
    }

    #[test]
    fn test_builder_renumbers_late_attributes() {
        let mut doc = XmlDocument::new();
        let root = doc.root();
        let el = doc.append_element(root, QName::parse("p"));
        doc.append_text(el, "hi");
        doc.append_text(el, " there");
        doc.set_attribute(el, QName::parse("class"), "x");
        let doc = doc.into_document_order();
        let el = doc.children(doc.root())[0];
        assert_eq!(el, 1);
        assert_eq!(doc.attributes(el), &[2]);
        assert_eq!(doc.children(el), &[3]);
        assert_eq!(doc.string_value(el), "hi there");
    }

    #[test]
    fn test_replace_value() {
        let mut doc = XmlDocument::parse("<a><b>old</b><c x='1'/></a>").unwrap();
        let a = doc.children(doc.root())[0];
        let b = doc.children(a)[0];
        let attr = doc.attributes(doc.children(a)[1])[0];
        doc.replace_value(b, "new");
        doc.replace_value(attr, "2");
        assert_eq!(doc.string_value(a), "new");
        assert_eq!(doc.string_value(attr), "2");
    }
}
