//! Defines the Abstract Syntax Tree (AST) for XPath expressions.

/// The top-level expression that can be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(String),
    Number(f64),
    LocationPath(LocationPath),
    Variable(String),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    /// A primary expression narrowed by predicates, e.g. `(//item)[1]`.
    Filter {
        expr: Box<Expression>,
        predicates: Vec<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Logical
    Or,
    And,
    // Equality
    Equals,
    NotEquals,
    // Relational
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    // Additive
    Plus,
    Minus,
    // Multiplicative
    Multiply,
    Divide,
    Modulo,
    // Set
    Union,
}

/// A location path, like `/child::foo`, `descendant::bar[1]`, or `$var/item`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// A starting expression for paths like `$var/foo`. `None` starts from the context node
    /// or root.
    pub start_point: Option<Box<Expression>>,
    /// True if the path starts from the document root (e.g., `/foo`).
    pub is_absolute: bool,
    pub steps: Vec<Step>,
}

/// A single step, like `child::foo[position() > 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expression>,
}

impl Step {
    pub(crate) fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            node_test: NodeTest::NodeType(NodeTypeTest::Node),
            predicates: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

impl Axis {
    /// Reverse axes number their predicate positions from the context node outwards.
    pub fn is_reverse(&self) -> bool {
        matches!(
            self,
            Axis::Parent
                | Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::PrecedingSibling
                | Axis::Preceding
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A qualified name test (e.g., `foo`, `svg:rect`).
    Name(String),
    /// `*`
    Wildcard,
    /// `prefix:*`
    PrefixWildcard(String),
    /// `text()`, `node()` and friends.
    NodeType(NodeTypeTest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTypeTest {
    Text,
    Node,
    Comment,
    /// `processing-instruction()` with an optional target literal.
    ProcessingInstruction(Option<String>),
}

/// Coarse classification of what a match pattern's last step tests, used for rule specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Terminal {
    Wildcard,
    Named,
    Predicate,
}

impl Expression {
    pub fn is_location_path(&self) -> bool {
        matches!(self, Expression::LocationPath(_))
    }

    /// True for the bare `/` pattern.
    pub fn is_root_path(&self) -> bool {
        match self {
            Expression::LocationPath(path) => {
                path.start_point.is_none() && path.is_absolute && path.steps.is_empty()
            }
            _ => false,
        }
    }

    /// Rewrites a match pattern so it can be evaluated from the root: every relative
    /// branch of a union is anchored with a leading `//`.
    pub fn to_match_pattern(&self) -> Expression {
        match self {
            Expression::BinaryOp {
                left,
                op: BinaryOperator::Union,
                right,
            } => Expression::BinaryOp {
                left: Box::new(left.to_match_pattern()),
                op: BinaryOperator::Union,
                right: Box::new(right.to_match_pattern()),
            },
            Expression::LocationPath(path) if path.start_point.is_none() && !path.is_absolute => {
                let mut steps = vec![Step::descendant_or_self()];
                steps.extend(path.steps.iter().cloned());
                Expression::LocationPath(LocationPath {
                    start_point: None,
                    is_absolute: true,
                    steps,
                })
            }
            other => other.clone(),
        }
    }

    /// The most specific classification among the branches of a pattern.
    pub fn terminal(&self) -> Terminal {
        match self {
            Expression::BinaryOp {
                left,
                op: BinaryOperator::Union,
                right,
            } => left.terminal().max(right.terminal()),
            Expression::LocationPath(path) => match path.steps.last() {
                None => Terminal::Named,
                Some(step) if !step.predicates.is_empty() => Terminal::Predicate,
                Some(step) => match step.node_test {
                    NodeTest::Name(_) => Terminal::Named,
                    NodeTest::Wildcard | NodeTest::PrefixWildcard(_) | NodeTest::NodeType(_) => {
                        Terminal::Wildcard
                    }
                },
            },
            _ => Terminal::Predicate,
        }
    }
}
