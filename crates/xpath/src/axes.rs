//! Contains pure functions for collecting nodes along each XPath axis.
//!
//! Forward axes return nodes in document order, reverse axes nearest-first.

use crate::ast::Axis;
use crate::document::{NodeId, NodeType, XmlDocument};

pub fn collect(doc: &XmlDocument, axis: Axis, node: NodeId) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children(node).to_vec(),
        Axis::Attribute => doc.attributes(node).to_vec(),
        Axis::Descendant => doc.descendants(node),
        Axis::DescendantOrSelf => {
            let mut out = vec![node];
            out.extend(doc.descendants(node));
            out
        }
        Axis::SelfAxis => vec![node],
        Axis::Parent => doc.parent(node).into_iter().collect(),
        Axis::Ancestor => ancestors(doc, node),
        Axis::AncestorOrSelf => {
            let mut out = vec![node];
            out.extend(ancestors(doc, node));
            out
        }
        Axis::FollowingSibling => siblings(doc, node, true),
        Axis::PrecedingSibling => siblings(doc, node, false),
        Axis::Following => following(doc, node),
        Axis::Preceding => preceding(doc, node),
    }
}

fn ancestors(doc: &XmlDocument, node: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut current = doc.parent(node);
    while let Some(p) = current {
        out.push(p);
        current = doc.parent(p);
    }
    out
}

fn siblings(doc: &XmlDocument, node: NodeId, forward: bool) -> Vec<NodeId> {
    if doc.node_type(node) == NodeType::Attribute {
        return Vec::new();
    }
    let Some(parent) = doc.parent(node) else {
        return Vec::new();
    };
    let all = doc.children(parent);
    let Some(pos) = all.iter().position(|&n| n == node) else {
        return Vec::new();
    };
    if forward {
        all[pos + 1..].to_vec()
    } else {
        all[..pos].iter().rev().copied().collect()
    }
}

/// Nodes after `node` in document order, excluding its descendants.
fn following(doc: &XmlDocument, node: NodeId) -> Vec<NodeId> {
    let start = if doc.node_type(node) == NodeType::Attribute {
        doc.parent(node).unwrap_or(node)
    } else {
        node
    };
    let mut out = Vec::new();
    let mut current = start;
    while let Some(parent) = doc.parent(current) {
        for sibling in siblings(doc, current, true) {
            out.push(sibling);
            out.extend(doc.descendants(sibling));
        }
        current = parent;
    }
    out
}

/// Nodes before `node` in document order, excluding its ancestors. Nearest first.
fn preceding(doc: &XmlDocument, node: NodeId) -> Vec<NodeId> {
    let start = if doc.node_type(node) == NodeType::Attribute {
        doc.parent(node).unwrap_or(node)
    } else {
        node
    };
    let mut out = Vec::new();
    let mut current = start;
    while let Some(parent) = doc.parent(current) {
        for sibling in siblings(doc, current, false) {
            let mut subtree = vec![sibling];
            subtree.extend(doc.descendants(sibling));
            out.extend(subtree.into_iter().rev());
        }
        current = parent;
    }
    out
}
