//! A joiner that builds a `serde_json::Value`. Markup is represented as JsonML.
use crate::config::{CharacterMap, OutputConfig};
use crate::error::JoinError;
use crate::frame::{
    MarkupFrame, ValueFrame, number_value, unsupported_number, unsupported_undefined,
};
use crate::{JoiningTransformer, Output, depth_error};
use serde_json::{Map, Value};

#[derive(Debug)]
enum Root {
    Container(ValueFrame),
    /// A scalar seed accepts no further values.
    Scalar(Value),
}

#[derive(Debug)]
enum Frame {
    Element { markup: MarkupFrame, children: Vec<Value> },
    Value(ValueFrame),
}

#[derive(Debug)]
pub struct JsonJoiner {
    root: Root,
    stack: Vec<Frame>,
    permissive: bool,
}

impl Default for JsonJoiner {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonJoiner {
    /// A joiner whose output starts as an empty array.
    pub fn new() -> Self {
        Self::with_seed(Value::Array(Vec::new()))
    }

    pub fn with_seed(seed: Value) -> Self {
        let root = match seed {
            Value::Array(items) => Root::Container(ValueFrame::Array(items)),
            Value::Object(map) => Root::Container(ValueFrame::object(map)),
            scalar => Root::Scalar(scalar),
        };
        Self {
            root,
            stack: Vec::new(),
            permissive: false,
        }
    }

    fn open_elements(&self) -> usize {
        self.stack.iter().filter(|f| matches!(f, Frame::Element { .. })).count()
    }

    fn push_child(markup: &mut MarkupFrame, children: &mut Vec<Value>, value: Value) {
        markup.content_started = true;
        if let Value::String(text) = &value {
            if let Some(Value::String(last)) = children.last_mut() {
                last.push_str(text);
                return;
            }
        }
        children.push(value);
    }

    fn close(&mut self, expected: &str) -> Result<Frame, JoinError> {
        let matches = match (expected, self.stack.last()) {
            ("element", Some(Frame::Element { .. })) => true,
            ("object", Some(Frame::Value(frame))) => frame.is_object(),
            ("array", Some(Frame::Value(frame))) => !frame.is_object(),
            _ => false,
        };
        match self.stack.pop() {
            Some(frame) if matches => Ok(frame),
            Some(frame) => {
                self.stack.push(frame);
                Err(JoinError::UnbalancedScope(format!(
                    "closing {} does not match the innermost open scope",
                    expected
                )))
            }
            None => Err(JoinError::UnbalancedScope(format!(
                "closing {} with nothing open",
                expected
            ))),
        }
    }
}

/// `[name, {attributes}?, ...children]`, with namespace declarations as `xmlns` attributes.
fn jsonml(markup: MarkupFrame, children: Vec<Value>) -> Value {
    let mut attributes = Map::new();
    for (prefix, uri) in markup.namespaces {
        let key = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        attributes.insert(key, Value::String(uri));
    }
    for (name, value) in markup.attributes {
        attributes.insert(name, Value::String(value));
    }

    let mut node = vec![Value::String(markup.name)];
    if !attributes.is_empty() {
        node.push(Value::Object(attributes));
    }
    node.extend(children);
    Value::Array(node)
}

impl JoiningTransformer for JsonJoiner {
    fn append(&mut self, value: Value) -> Result<(), JoinError> {
        match self.stack.last_mut() {
            Some(Frame::Element { markup, children }) => {
                Self::push_child(markup, children, value);
                Ok(())
            }
            Some(Frame::Value(frame)) => frame.append(value),
            None => match &mut self.root {
                Root::Container(frame) => frame.append(value),
                Root::Scalar(seed) => Err(JoinError::AppendToNonContainer(format!(
                    "cannot append {} to {}",
                    value, seed
                ))),
            },
        }
    }

    fn number(&mut self, value: f64) -> Result<(), JoinError> {
        if value.is_finite() {
            self.append(number_value(value))
        } else if self.permissive {
            self.append(Value::Null)
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
            Some(Frame::Element { .. }) => Err(JoinError::MissingPropertyKey(format!(
                "property '{}' inside an element",
                key
            ))),
            None => match &mut self.root {
                Root::Container(frame) => frame.set_key(key),
                Root::Scalar(_) => Err(JoinError::AppendToNonContainer(format!(
                    "property '{}' on a scalar output",
                    key
                ))),
            },
        }
    }

    fn start_object(&mut self, seed: Map<String, Value>) -> Result<(), JoinError> {
        self.stack.push(Frame::Value(ValueFrame::object(seed)));
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), JoinError> {
        match self.close("object")? {
            Frame::Value(frame) => self.append(frame.finish()),
            Frame::Element { .. } => Err(JoinError::UnbalancedScope("expected an object".into())),
        }
    }

    fn start_array(&mut self, seed: Vec<Value>) -> Result<(), JoinError> {
        self.stack.push(Frame::Value(ValueFrame::Array(seed)));
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), JoinError> {
        match self.close("array")? {
            Frame::Value(frame) => self.append(frame.finish()),
            Frame::Element { .. } => Err(JoinError::UnbalancedScope("expected an array".into())),
        }
    }

    fn start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
    ) -> Result<(), JoinError> {
        if let Some(Frame::Element { markup, .. }) = self.stack.last_mut() {
            markup.content_started = true;
        }
        self.stack.push(Frame::Element {
            markup: MarkupFrame::new(name, attributes),
            children: Vec::new(),
        });
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), JoinError> {
        match self.close("element")? {
            Frame::Element { markup, children } => self.append(jsonml(markup, children)),
            Frame::Value(_) => Err(JoinError::UnbalancedScope("expected an element".into())),
        }
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), JoinError> {
        match self.stack.last_mut() {
            Some(Frame::Element { markup, .. }) => markup.set_attribute(name, value),
            _ => Err(JoinError::InvalidAttributeTarget(format!("attribute '{}'", name))),
        }
    }

    fn namespace(&mut self, depth: usize, prefix: &str, uri: &str) -> Result<(), JoinError> {
        let open = self.open_elements();
        if depth == 0 {
            return Err(depth_error(depth, open));
        }
        let target = self
            .stack
            .iter_mut()
            .filter_map(|f| match f {
                Frame::Element { markup, .. } => Some(markup),
                Frame::Value(_) => None,
            })
            .nth(depth - 1);
        match target {
            Some(markup) => {
                markup.declare(prefix, uri);
                Ok(())
            }
            None => Err(depth_error(depth, open)),
        }
    }

    fn text(&mut self, text: &str) -> Result<(), JoinError> {
        self.append(Value::String(text.to_string()))
    }

    fn comment(&mut self, text: &str) -> Result<(), JoinError> {
        self.append(Value::Array(vec!["!".into(), text.into()]))
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), JoinError> {
        self.append(Value::Array(vec!["?".into(), target.into(), data.into()]))
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
        let value = match &self.root {
            Root::Container(frame) => frame.clone().finish(),
            Root::Scalar(value) => value.clone(),
        };
        Ok(Output::Json(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_of(joiner: &mut JsonJoiner) -> Value {
        match joiner.get().unwrap() {
            Output::Json(value) => value,
            other => panic!("Expected JSON, got {:?}", other),
        }
    }

    #[test]
    fn test_default_seed_collects_values() {
        let mut j = JsonJoiner::new();
        j.string("a").unwrap();
        j.number(1.5).unwrap();
        j.boolean(false).unwrap();
        j.null().unwrap();
        assert_eq!(json_of(&mut j), json!(["a", 1.5, false, null]));
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let mut j = JsonJoiner::with_seed(json!({}));
        j.property("items").unwrap();
        j.start_array(vec![]).unwrap();
        j.start_object(Map::new()).unwrap();
        j.property("id").unwrap();
        j.number(1.0).unwrap();
        j.end_object().unwrap();
        j.end_array().unwrap();
        j.append(json!({ "total": 1 })).unwrap();
        assert_eq!(json_of(&mut j), json!({ "items": [{ "id": 1 }], "total": 1 }));
    }

    #[test]
    fn test_scalar_seed_refuses_appends() {
        let mut j = JsonJoiner::with_seed(json!(5));
        assert!(matches!(j.string("x"), Err(JoinError::AppendToNonContainer(_))));
        assert_eq!(json_of(&mut j), json!(5));
    }

    #[test]
    fn test_elements_become_jsonml() {
        let mut j = JsonJoiner::new();
        j.start_element("ul", &[("class".into(), "list".into())]).unwrap();
        j.start_element("li", &[]).unwrap();
        j.text("one").unwrap();
        j.text(" more").unwrap();
        j.end_element().unwrap();
        j.comment("note").unwrap();
        j.processing_instruction("pi", "data").unwrap();
        j.namespace(1, "x", "urn:x").unwrap();
        j.end_element().unwrap();
        assert_eq!(
            json_of(&mut j),
            json!([[
                "ul",
                { "xmlns:x": "urn:x", "class": "list" },
                ["li", "one more"],
                ["!", "note"],
                ["?", "pi", "data"]
            ]])
        );
    }

    #[test]
    fn test_permissive_numbers_become_null() {
        let mut j = JsonJoiner::new();
        assert!(j.number(f64::NAN).is_err());
        j.set_permissive(true);
        j.number(f64::NAN).unwrap();
        j.undefined().unwrap();
        assert_eq!(json_of(&mut j), json!([null]));
    }

    #[test]
    fn test_mismatched_close_keeps_scope_open() {
        let mut j = JsonJoiner::new();
        j.start_array(vec![]).unwrap();
        assert!(matches!(j.end_object(), Err(JoinError::UnbalancedScope(_))));
        assert!(j.get().is_err());
        j.end_array().unwrap();
        assert_eq!(json_of(&mut j), json!([[]]));
    }
}
