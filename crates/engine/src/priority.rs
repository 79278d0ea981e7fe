//! Rule priority: an explicit number, or a score derived from what a selector's last step tests.
use crate::error::TransformError;

/// What the final step of a selector tests, from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Terminal {
    /// `*`, recursive descent, a node-type or value-type test.
    Wildcard,
    /// An exact name.
    Named,
    /// A positional or predicate step.
    Predicate,
}

impl Terminal {
    pub fn score(self) -> f64 {
        match self {
            Terminal::Wildcard => -0.5,
            Terminal::Named => 0.0,
            Terminal::Predicate => 0.5,
        }
    }
}

/// An explicit priority always wins; the specificity is only computed without one.
pub fn resolve_priority<F>(explicit: Option<f64>, specificity: F) -> Result<f64, TransformError>
where
    F: FnOnce() -> Result<f64, TransformError>,
{
    match explicit {
        Some(priority) => Ok(priority),
        None => specificity(),
    }
}
