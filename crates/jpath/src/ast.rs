//! Defines the Abstract Syntax Tree (AST) for JSON path selectors.
use serde_json::Value;

/// Where evaluation of a path begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// `$`: the document root.
    Root,
    /// `@`, `.` or a bare leading name: the current node.
    Current,
}

/// A parsed JSON path selector.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    pub origin: Origin,
    pub segments: Vec<Segment>,
    /// A trailing `~` asks for the key names of the selected nodes instead of their values.
    pub property_names: bool,
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name`, `[...]`
    Child(Selector),
    /// `..name`, `..*`, `..[...]`
    Descendant(Selector),
    /// `@string()` and friends: keeps only nodes of the given JSON type.
    TypeTest(JsonType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Name(String),
    Index(i64),
    Wildcard,
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    Union(Vec<Selector>),
    Filter(FilterExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Array,
    Object,
    Scalar,
}

impl JsonType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => JsonType::String,
            "number" => JsonType::Number,
            "integer" => JsonType::Integer,
            "boolean" => JsonType::Boolean,
            "null" => JsonType::Null,
            "array" => JsonType::Array,
            "object" => JsonType::Object,
            "scalar" => JsonType::Scalar,
            _ => return None,
        })
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
            JsonType::Integer => value.is_i64() || value.is_u64(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Null => value.is_null(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
            JsonType::Scalar => !value.is_array() && !value.is_object(),
        }
    }
}

/// A boolean test inside `[?( ... )]`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Or(Box<FilterExpr>, Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// A bare operand: a path must select something truthy, a literal must be truthy.
    Exists(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(JsonPath),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Coarse classification of the last step of a path, used for rule specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Ends in an exact name (or is the bare root).
    Named,
    /// Ends in `*`, `..*` or a type test.
    Wildcard,
    /// Ends in an index, slice, union or filter.
    Predicate,
}

impl JsonPath {
    pub fn is_root(&self) -> bool {
        self.origin == Origin::Root && self.segments.is_empty() && !self.property_names
    }

    pub fn uses_filters(&self) -> bool {
        self.segments.iter().any(|segment| match segment {
            Segment::Child(sel) | Segment::Descendant(sel) => sel.uses_filters(),
            Segment::TypeTest(_) => false,
        })
    }

    pub fn terminal(&self) -> Terminal {
        match self.segments.last() {
            None => Terminal::Named,
            Some(Segment::TypeTest(_)) => Terminal::Wildcard,
            Some(Segment::Child(sel)) | Some(Segment::Descendant(sel)) => match sel {
                Selector::Name(_) => Terminal::Named,
                Selector::Wildcard => Terminal::Wildcard,
                Selector::Index(_)
                | Selector::Slice { .. }
                | Selector::Union(_)
                | Selector::Filter(_) => Terminal::Predicate,
            },
        }
    }
}

impl Selector {
    fn uses_filters(&self) -> bool {
        match self {
            Selector::Filter(_) => true,
            Selector::Union(items) => items.iter().any(Selector::uses_filters),
            _ => false,
        }
    }
}
