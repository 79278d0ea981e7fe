//! Serialization options recorded through `output(...)` and `character_map(...)`.
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMethod {
    #[default]
    Xml,
    Html,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Escaping {
    /// Only markup-significant characters are escaped.
    #[default]
    Default,
    /// Non-ASCII characters are also written as hexadecimal character references.
    Numeric,
}

/// Serialization-wide options. Unset fields keep whatever an earlier call recorded.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    pub method: Option<OutputMethod>,
    pub omit_xml_declaration: Option<bool>,
    pub doctype_public: Option<String>,
    pub doctype_system: Option<String>,
    pub encoding: Option<String>,
    pub escaping: Option<Escaping>,
    pub use_character_maps: Vec<String>,
}

impl OutputConfig {
    pub fn method(&self) -> OutputMethod {
        self.method.unwrap_or_default()
    }

    pub fn escaping(&self) -> Escaping {
        self.escaping.unwrap_or_default()
    }

    pub fn encoding(&self) -> &str {
        self.encoding.as_deref().unwrap_or("UTF-8")
    }

    pub fn omits_declaration(&self) -> bool {
        self.omit_xml_declaration.unwrap_or(false)
    }

    /// Folds a later `output(...)` call into this one. Character maps accumulate.
    pub fn merge(&mut self, other: OutputConfig) {
        if other.method.is_some() {
            self.method = other.method;
        }
        if other.omit_xml_declaration.is_some() {
            self.omit_xml_declaration = other.omit_xml_declaration;
        }
        if other.doctype_public.is_some() {
            self.doctype_public = other.doctype_public;
        }
        if other.doctype_system.is_some() {
            self.doctype_system = other.doctype_system;
        }
        if other.encoding.is_some() {
            self.encoding = other.encoding;
        }
        if other.escaping.is_some() {
            self.escaping = other.escaping;
        }
        for name in other.use_character_maps {
            if !self.use_character_maps.contains(&name) {
                self.use_character_maps.push(name);
            }
        }
    }
}

/// Literal substitutions applied to text and attribute content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacterMap(HashMap<char, String>);

impl CharacterMap {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(c, s)| (c, s.into())).collect())
    }

    pub fn get(&self, c: char) -> Option<&str> {
        self.0.get(&c).map(String::as_str)
    }

    pub fn extend(&mut self, other: &CharacterMap) {
        self.0.extend(other.0.iter().map(|(c, s)| (*c, s.clone())));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let config: OutputConfig = serde_json::from_str(
            r#"{ "method": "html", "omitXmlDeclaration": true, "useCharacterMaps": ["nbsp"] }"#,
        )
        .unwrap();
        assert_eq!(config.method(), OutputMethod::Html);
        assert!(config.omits_declaration());
        assert_eq!(config.use_character_maps, vec!["nbsp"]);
        assert_eq!(config.escaping(), Escaping::Default);
    }

    #[test]
    fn test_merge_keeps_earlier_settings() {
        let mut config = OutputConfig {
            method: Some(OutputMethod::Xml),
            encoding: Some("ISO-8859-1".into()),
            use_character_maps: vec!["a".into()],
            ..Default::default()
        };
        config.merge(OutputConfig {
            omit_xml_declaration: Some(true),
            use_character_maps: vec!["b".into(), "a".into()],
            ..Default::default()
        });
        assert_eq!(config.method(), OutputMethod::Xml);
        assert_eq!(config.encoding(), "ISO-8859-1");
        assert!(config.omits_declaration());
        assert_eq!(config.use_character_maps, vec!["a", "b"]);
    }
}
