//! A joiner that builds an [`XmlDocument`], so the output can be queried again with XPath.
use crate::config::{CharacterMap, OutputConfig};
use crate::error::JoinError;
use crate::frame::{
    ValueFrame, non_finite_text, number_value, unsupported_number, unsupported_undefined,
    value_text,
};
use crate::string::StringJoiner;
use crate::{JoiningTransformer, Output, depth_error};
use serde_json::{Map, Value};
use stencil_xpath::{NodeId, NodeKind, QName, XmlDocument};

#[derive(Debug)]
enum Frame {
    Element { id: NodeId, content_started: bool },
    Value(ValueFrame),
}

#[derive(Debug, Default)]
pub struct DomJoiner {
    doc: XmlDocument,
    stack: Vec<Frame>,
    permissive: bool,
}

impl DomJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_elements(&self) -> usize {
        self.stack.iter().filter(|f| matches!(f, Frame::Element { .. })).count()
    }

    /// The innermost open element, or the document root. Marks it as having content.
    fn insertion_point(&mut self) -> NodeId {
        for frame in self.stack.iter_mut().rev() {
            if let Frame::Element { id, content_started } = frame {
                *content_started = true;
                return *id;
            }
        }
        self.doc.root()
    }

    fn close_value(&mut self, object: bool) -> Result<(), JoinError> {
        match self.stack.pop() {
            Some(Frame::Value(frame)) if frame.is_object() == object => self.append(frame.finish()),
            Some(frame) => {
                self.stack.push(frame);
                Err(JoinError::UnbalancedScope(format!(
                    "closing {} does not match the innermost open scope",
                    if object { "object" } else { "array" }
                )))
            }
            None => Err(JoinError::UnbalancedScope("nothing is open".into())),
        }
    }
}

impl JoiningTransformer for DomJoiner {
    fn append(&mut self, value: Value) -> Result<(), JoinError> {
        if let Some(Frame::Value(frame)) = self.stack.last_mut() {
            return frame.append(value);
        }
        self.text(&value_text(&value))
    }

    fn number(&mut self, value: f64) -> Result<(), JoinError> {
        if value.is_finite() {
            self.append(number_value(value))
        } else if self.permissive {
            self.text(non_finite_text(value))
        } else {
            Err(unsupported_number(value))
        }
    }

    fn undefined(&mut self) -> Result<(), JoinError> {
        if self.permissive {
            Ok(())
        } else {
            Err(unsupported_undefined())
        }
    }

    fn property(&mut self, key: &str) -> Result<(), JoinError> {
        match self.stack.last_mut() {
            Some(Frame::Value(frame)) => frame.set_key(key),
            _ => Err(JoinError::MissingPropertyKey(format!(
                "property '{}' outside an object",
                key
            ))),
        }
    }

    fn start_object(&mut self, seed: Map<String, Value>) -> Result<(), JoinError> {
        self.stack.push(Frame::Value(ValueFrame::object(seed)));
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), JoinError> {
        self.close_value(true)
    }

    fn start_array(&mut self, seed: Vec<Value>) -> Result<(), JoinError> {
        self.stack.push(Frame::Value(ValueFrame::Array(seed)));
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), JoinError> {
        self.close_value(false)
    }

    fn start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
    ) -> Result<(), JoinError> {
        let parent = self.insertion_point();
        let id = self.doc.append_element(parent, QName::parse(name));
        for (key, value) in attributes {
            self.doc.set_attribute(id, QName::parse(key), value);
        }
        self.stack.push(Frame::Element {
            id,
            content_started: false,
        });
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), JoinError> {
        match self.stack.pop() {
            Some(Frame::Element { .. }) => Ok(()),
            Some(frame) => {
                self.stack.push(frame);
                Err(JoinError::UnbalancedScope(
                    "closing an element while a value scope is open".into(),
                ))
            }
            None => Err(JoinError::UnbalancedScope("closing an element with nothing open".into())),
        }
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), JoinError> {
        match self.stack.last() {
            Some(Frame::Element {
                id,
                content_started: false,
            }) => {
                self.doc.set_attribute(*id, QName::parse(name), value);
                Ok(())
            }
            Some(Frame::Element { .. }) => Err(JoinError::InvalidAttributeTarget(format!(
                "attribute '{}' after element content",
                name
            ))),
            _ => Err(JoinError::InvalidAttributeTarget(format!("attribute '{}'", name))),
        }
    }

    fn namespace(&mut self, depth: usize, prefix: &str, uri: &str) -> Result<(), JoinError> {
        let open = self.open_elements();
        let target = self
            .stack
            .iter()
            .filter_map(|f| match f {
                Frame::Element { id, .. } => Some(*id),
                Frame::Value(_) => None,
            })
            .nth(depth.wrapping_sub(1));
        match target {
            Some(id) if depth > 0 => {
                self.doc.add_namespace(id, prefix, uri);
                Ok(())
            }
            _ => Err(depth_error(depth, open)),
        }
    }

    fn text(&mut self, text: &str) -> Result<(), JoinError> {
        if let Some(Frame::Value(frame)) = self.stack.last_mut() {
            return frame.append(Value::String(text.to_string()));
        }
        if text.is_empty() {
            return Ok(());
        }
        let parent = self.insertion_point();
        self.doc.append_text(parent, text);
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), JoinError> {
        let parent = self.insertion_point();
        self.doc.append_comment(parent, text);
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), JoinError> {
        let parent = self.insertion_point();
        self.doc.append_processing_instruction(parent, target, data);
        Ok(())
    }

    fn element_depth(&self) -> usize {
        self.open_elements()
    }

    fn output(&mut self, _config: OutputConfig) {}

    fn character_map(&mut self, _name: &str, _map: CharacterMap) {}

    fn set_permissive(&mut self, permissive: bool) {
        self.permissive = permissive;
    }

    fn get(&mut self) -> Result<Output, JoinError> {
        if !self.stack.is_empty() {
            return Err(JoinError::UnbalancedScope(format!(
                "{} scope(s) still open",
                self.stack.len()
            )));
        }
        Ok(Output::Document(self.doc.clone().into_document_order()))
    }
}

/// Serializes a document as XML without a declaration.
pub fn serialize_document(doc: &XmlDocument) -> Result<String, JoinError> {
    let mut joiner = StringJoiner::with_config(OutputConfig {
        omit_xml_declaration: Some(true),
        ..Default::default()
    });
    for &child in doc.children(doc.root()) {
        replay(doc, child, &mut joiner)?;
    }
    joiner.finish()
}

fn replay(doc: &XmlDocument, id: NodeId, joiner: &mut StringJoiner) -> Result<(), JoinError> {
    match doc.kind(id) {
        NodeKind::Element {
            name,
            attributes,
            namespaces,
        } => {
            let attrs: Vec<(String, String)> = attributes
                .iter()
                .filter_map(|&attr| match doc.kind(attr) {
                    NodeKind::Attribute { name, value } => Some((name.to_string(), value.clone())),
                    _ => None,
                })
                .collect();
            joiner.start_element(&name.to_string(), &attrs)?;
            let depth = joiner.element_depth();
            for (prefix, uri) in namespaces {
                joiner.namespace(depth, prefix, uri)?;
            }
            for &child in doc.children(id) {
                replay(doc, child, joiner)?;
            }
            joiner.end_element()
        }
        NodeKind::Text(text) => joiner.text(text),
        NodeKind::Comment(text) => joiner.comment(text),
        NodeKind::ProcessingInstruction { target, data } => {
            joiner.processing_instruction(target, data)
        }
        NodeKind::Root | NodeKind::Attribute { .. } => Ok(()),
    }
}
