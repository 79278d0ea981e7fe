//! A joiner that produces text: plain concatenation outside elements, serialized markup inside.
//!
//! Start tags are written when their element closes, so a namespace declaration can be
//! attached to any element that is still open.
use crate::config::{CharacterMap, Escaping, OutputConfig, OutputMethod};
use crate::error::JoinError;
use crate::frame::{
    MarkupFrame, ValueFrame, non_finite_text, number_value, unsupported_number,
    unsupported_undefined, value_text,
};
use crate::{JoiningTransformer, Output, depth_error};
use quick_xml::Writer;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

const HTML_VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug)]
enum Frame {
    Element { markup: MarkupFrame, content: String },
    Value(ValueFrame),
}

#[derive(Debug, Default)]
pub struct StringJoiner {
    out: String,
    stack: Vec<Frame>,
    config: OutputConfig,
    character_maps: HashMap<String, CharacterMap>,
    permissive: bool,
    prolog_written: bool,
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), JoinError> {
    writer.write_event(event).map_err(|e| JoinError::Write(e.to_string()))
}

impl StringJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The accumulated text. Fails while a scope is still open.
    pub fn finish(&self) -> Result<String, JoinError> {
        if !self.stack.is_empty() {
            return Err(JoinError::UnbalancedScope(format!(
                "{} scope(s) still open",
                self.stack.len()
            )));
        }
        Ok(self.out.clone())
    }

    fn method(&self) -> OutputMethod {
        self.config.method()
    }

    fn open_elements(&self) -> usize {
        self.stack.iter().filter(|f| matches!(f, Frame::Element { .. })).count()
    }

    /// Writes already-serialized markup at the current position.
    fn write_raw(&mut self, markup: &str) -> Result<(), JoinError> {
        match self.stack.last_mut() {
            Some(Frame::Element { markup: frame, content }) => {
                frame.content_started = true;
                content.push_str(markup);
                Ok(())
            }
            Some(Frame::Value(frame)) => frame.append(Value::String(markup.to_string())),
            None => {
                self.out.push_str(markup);
                Ok(())
            }
        }
    }

    fn escape(&self, text: &str, attribute: bool) -> String {
        if self.method() == OutputMethod::Text {
            return text.to_string();
        }
        let mut active = CharacterMap::default();
        for name in &self.config.use_character_maps {
            if let Some(map) = self.character_maps.get(name) {
                active.extend(map);
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut run = String::new();
        for c in text.chars() {
            match active.get(c) {
                Some(replacement) => {
                    self.push_escaped(&mut out, &run, attribute);
                    run.clear();
                    out.push_str(replacement);
                }
                None => run.push(c),
            }
        }
        self.push_escaped(&mut out, &run, attribute);
        out
    }

    fn push_escaped(&self, out: &mut String, run: &str, attribute: bool) {
        let escaped = if attribute { escape(run) } else { partial_escape(run) };
        if self.config.escaping() == Escaping::Numeric {
            for c in escaped.chars() {
                if c.is_ascii() {
                    out.push(c);
                } else {
                    let _ = write!(out, "&#x{:X};", c as u32);
                }
            }
        } else {
            out.push_str(&escaped);
        }
    }

    fn render_element(&self, markup: &MarkupFrame, content: &str) -> Result<String, JoinError> {
        let method = self.method();
        if method == OutputMethod::Text {
            return Ok(content.to_string());
        }

        let mut start = BytesStart::new(markup.name.as_str());
        for (prefix, uri) in &markup.namespaces {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            push_raw_attribute(&mut start, &key, &self.escape(uri, true));
        }
        for (name, value) in &markup.attributes {
            push_raw_attribute(&mut start, name, &self.escape(value, true));
        }

        let mut writer = Writer::new(Vec::new());
        let end = BytesEnd::new(markup.name.as_str());
        if !content.is_empty() {
            write_event(&mut writer, Event::Start(start))?;
            writer.get_mut().extend_from_slice(content.as_bytes());
            write_event(&mut writer, Event::End(end))?;
        } else if method == OutputMethod::Html {
            let void = HTML_VOID_ELEMENTS.contains(&markup.name.to_ascii_lowercase().as_str());
            write_event(&mut writer, Event::Start(start))?;
            if !void {
                write_event(&mut writer, Event::End(end))?;
            }
        } else {
            write_event(&mut writer, Event::Empty(start))?;
        }
        Ok(String::from_utf8(writer.into_inner())?)
    }

    /// The XML declaration and doctype that precede the first root element.
    fn prolog(&self, root_name: &str) -> Result<String, JoinError> {
        let mut writer = Writer::new(Vec::new());
        let method = self.method();
        if method == OutputMethod::Xml && !self.config.omits_declaration() {
            let decl = BytesDecl::new("1.0", Some(self.config.encoding()), None);
            write_event(&mut writer, Event::Decl(decl))?;
        }
        if method != OutputMethod::Text {
            let doctype = match (&self.config.doctype_public, &self.config.doctype_system) {
                (Some(public), Some(system)) => {
                    Some(format!("{} PUBLIC \"{}\" \"{}\"", root_name, public, system))
                }
                (Some(public), None) => Some(format!("{} PUBLIC \"{}\"", root_name, public)),
                (None, Some(system)) => Some(format!("{} SYSTEM \"{}\"", root_name, system)),
                (None, None) => None,
            };
            if let Some(doctype) = doctype {
                write_event(&mut writer, Event::DocType(BytesText::from_escaped(doctype)))?;
            }
        }
        Ok(String::from_utf8(writer.into_inner())?)
    }
}

fn push_raw_attribute(start: &mut BytesStart<'_>, key: &str, escaped_value: &str) {
    start.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Borrowed(escaped_value.as_bytes()),
    });
}

impl JoiningTransformer for StringJoiner {
    fn append(&mut self, value: Value) -> Result<(), JoinError> {
        if let Some(Frame::Value(frame)) = self.stack.last_mut() {
            return frame.append(value);
        }
        self.text(&value_text(&value))
    }

    fn number(&mut self, value: f64) -> Result<(), JoinError> {
        if value.is_finite() {
            return self.append(number_value(value));
        }
        if !self.permissive {
            return Err(unsupported_number(value));
        }
        match self.stack.last() {
            Some(Frame::Value(_)) => self.append(Value::Null),
            _ => self.text(non_finite_text(value)),
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
        match self.stack.pop() {
            Some(Frame::Value(frame)) if frame.is_object() => self.append(frame.finish()),
            other => Err(unbalanced("object", other, &mut self.stack)),
        }
    }

    fn start_array(&mut self, seed: Vec<Value>) -> Result<(), JoinError> {
        self.stack.push(Frame::Value(ValueFrame::Array(seed)));
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), JoinError> {
        match self.stack.pop() {
            Some(Frame::Value(frame)) if !frame.is_object() => self.append(frame.finish()),
            other => Err(unbalanced("array", other, &mut self.stack)),
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
            content: String::new(),
        });
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), JoinError> {
        let (markup, content) = match self.stack.pop() {
            Some(Frame::Element { markup, content }) => (markup, content),
            other => return Err(unbalanced("element", other, &mut self.stack)),
        };
        let rendered = self.render_element(&markup, &content)?;
        if self.stack.is_empty() && !self.prolog_written {
            self.prolog_written = true;
            let prolog = self.prolog(&markup.name)?;
            self.out.push_str(&prolog);
        }
        self.write_raw(&rendered)
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), JoinError> {
        match self.stack.last_mut() {
            Some(Frame::Element { markup, .. }) => markup.set_attribute(name, value),
            _ => Err(JoinError::InvalidAttributeTarget(format!("attribute '{}'", name))),
        }
    }

    fn namespace(&mut self, depth: usize, prefix: &str, uri: &str) -> Result<(), JoinError> {
        let open = self.open_elements();
        let target = self
            .stack
            .iter_mut()
            .filter_map(|f| match f {
                Frame::Element { markup, .. } => Some(markup),
                Frame::Value(_) => None,
            })
            .nth(depth.wrapping_sub(1));
        match target {
            Some(markup) if depth > 0 => {
                markup.declare(prefix, uri);
                Ok(())
            }
            _ => Err(depth_error(depth, open)),
        }
    }

    fn text(&mut self, text: &str) -> Result<(), JoinError> {
        if self.open_elements() == 0 && !matches!(self.stack.last(), Some(Frame::Value(_))) {
            self.out.push_str(text);
            return Ok(());
        }
        let escaped = self.escape(text, false);
        self.write_raw(&escaped)
    }

    fn comment(&mut self, text: &str) -> Result<(), JoinError> {
        if self.method() == OutputMethod::Text {
            return Ok(());
        }
        let mut writer = Writer::new(Vec::new());
        write_event(&mut writer, Event::Comment(BytesText::from_escaped(text)))?;
        let rendered = String::from_utf8(writer.into_inner())?;
        self.write_raw(&rendered)
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), JoinError> {
        if self.method() == OutputMethod::Text {
            return Ok(());
        }
        let content = if data.is_empty() {
            target.to_string()
        } else {
            format!("{} {}", target, data)
        };
        let mut writer = Writer::new(Vec::new());
        write_event(&mut writer, Event::PI(BytesPI::new(content)))?;
        let rendered = String::from_utf8(writer.into_inner())?;
        self.write_raw(&rendered)
    }

    fn element_depth(&self) -> usize {
        self.open_elements()
    }

    fn output(&mut self, config: OutputConfig) {
        self.config.merge(config);
        log::debug!("Output configuration is now {:?}", self.config);
    }

    fn character_map(&mut self, name: &str, map: CharacterMap) {
        self.character_maps.insert(name.to_string(), map);
    }

    fn set_permissive(&mut self, permissive: bool) {
        self.permissive = permissive;
    }

    fn get(&mut self) -> Result<Output, JoinError> {
        self.finish().map(Output::Text)
    }
}

/// Puts back a frame popped by a mismatched close and describes the mismatch.
fn unbalanced(expected: &str, popped: Option<Frame>, stack: &mut Vec<Frame>) -> JoinError {
    let found = match &popped {
        Some(Frame::Element { markup, .. }) => format!("<{}>", markup.name),
        Some(Frame::Value(frame)) if frame.is_object() => "an object".to_string(),
        Some(Frame::Value(_)) => "an array".to_string(),
        None => "nothing".to_string(),
    };
    if let Some(frame) = popped {
        stack.push(frame);
    }
    JoinError::UnbalancedScope(format!("closing {} but {} is open", expected, found))
}
