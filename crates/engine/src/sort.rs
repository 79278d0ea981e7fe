//! Sort specifications and the comparisons they compile to.
//!
//! A specification is a selector shorthand, a [`SortKey`] descriptor, a comparator
//! closure, or an ordered list of those. Declarative forms may also arrive as raw
//! JSON and are only validated when a sort actually runs.
use crate::adapter::{Match, NodeAdapter};
use crate::context::DispatchContext;
use crate::error::TransformError;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortType {
    #[default]
    Text,
    Number,
}

/// Which differences a locale-aware comparison notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Base letters only: `a = á = A`.
    Base,
    /// Base letters and accents: `a ≠ á`, `a = A`.
    Accent,
    /// Base letters and case: `a ≠ A`, `a = á`.
    Case,
    #[default]
    Variant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocaleOptions {
    pub sensitivity: Sensitivity,
    /// Compares runs of digits by numeric value.
    pub numeric: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SortKey {
    pub select: String,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default, rename = "type")]
    pub data_type: SortType,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub locale_options: LocaleOptions,
}

impl SortKey {
    pub fn new(select: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            order: SortOrder::Ascending,
            data_type: SortType::Text,
            locale: None,
            locale_options: LocaleOptions::default(),
        }
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn numeric(mut self) -> Self {
        self.data_type = SortType::Number;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>, options: LocaleOptions) -> Self {
        self.locale = Some(locale.into());
        self.locale_options = options;
        self
    }
}

type NodeMatch<A> = Match<<A as NodeAdapter>::Node>;

pub type Comparator<A> = Rc<dyn Fn(&DispatchContext<A>, &NodeMatch<A>, &NodeMatch<A>) -> Ordering>;

pub enum SortSpec<A: NodeAdapter> {
    /// Shorthand for an ascending text sort on a selector.
    Select(String),
    Key(SortKey),
    Comparator(Comparator<A>),
    /// Keys in precedence order; the first non-equal comparison decides.
    Multi(Vec<SortSpec<A>>),
    /// A string, descriptor object or array of those, checked when the sort runs.
    Declarative(Value),
}

impl<A: NodeAdapter> fmt::Debug for SortSpec<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortSpec::Select(select) => f.debug_tuple("Select").field(select).finish(),
            SortSpec::Key(key) => f.debug_tuple("Key").field(key).finish(),
            SortSpec::Comparator(_) => f.write_str("Comparator(..)"),
            SortSpec::Multi(specs) => f.debug_tuple("Multi").field(specs).finish(),
            SortSpec::Declarative(value) => f.debug_tuple("Declarative").field(value).finish(),
        }
    }
}

impl<A: NodeAdapter> SortSpec<A> {
    pub fn comparator<F>(compare: F) -> Self
    where
        F: Fn(&DispatchContext<A>, &Match<A::Node>, &Match<A::Node>) -> Ordering + 'static,
    {
        SortSpec::Comparator(Rc::new(compare))
    }

    /// Flattens the specification into its ordered keys.
    pub(crate) fn compile(&self) -> Result<Vec<CompiledKey<A>>, TransformError> {
        let mut keys = Vec::new();
        self.compile_into(&mut keys)?;
        if keys.is_empty() {
            return Err(TransformError::InvalidSortSpec("no sort keys".into()));
        }
        Ok(keys)
    }

    fn compile_into(&self, keys: &mut Vec<CompiledKey<A>>) -> Result<(), TransformError> {
        match self {
            SortSpec::Select(select) => {
                keys.push(CompiledKey::Key(validated(SortKey::new(select.clone()))?))
            }
            SortSpec::Key(key) => keys.push(CompiledKey::Key(validated(key.clone())?)),
            SortSpec::Comparator(compare) => keys.push(CompiledKey::Comparator(Rc::clone(compare))),
            SortSpec::Multi(specs) => {
                for spec in specs {
                    spec.compile_into(keys)?;
                }
            }
            SortSpec::Declarative(value) => compile_declarative(value, keys)?,
        }
        Ok(())
    }
}

impl<A: NodeAdapter> From<&str> for SortSpec<A> {
    fn from(select: &str) -> Self {
        SortSpec::Select(select.to_string())
    }
}

impl<A: NodeAdapter> From<SortKey> for SortSpec<A> {
    fn from(key: SortKey) -> Self {
        SortSpec::Key(key)
    }
}

fn validated(key: SortKey) -> Result<SortKey, TransformError> {
    if key.select.trim().is_empty() {
        return Err(TransformError::InvalidSortSpec("empty select".into()));
    }
    Ok(key)
}

fn compile_declarative<A: NodeAdapter>(
    value: &Value,
    keys: &mut Vec<CompiledKey<A>>,
) -> Result<(), TransformError> {
    match value {
        Value::String(select) => {
            keys.push(CompiledKey::Key(validated(SortKey::new(select.clone()))?))
        }
        Value::Object(_) => {
            let key: SortKey = serde_json::from_value(value.clone())
                .map_err(|e| TransformError::InvalidSortSpec(e.to_string()))?;
            keys.push(CompiledKey::Key(validated(key)?));
        }
        Value::Array(items) => {
            for item in items {
                if item.is_array() {
                    return Err(TransformError::InvalidSortSpec("nested key lists".into()));
                }
                compile_declarative(item, keys)?;
            }
        }
        other => {
            return Err(TransformError::InvalidSortSpec(format!(
                "expected a selector, descriptor or list, found {}",
                other
            )));
        }
    }
    Ok(())
}

pub(crate) enum CompiledKey<A: NodeAdapter> {
    Key(SortKey),
    Comparator(Comparator<A>),
}

/// A key value computed once per item before sorting.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SortValue {
    Text(String),
    /// `None` when the value does not convert to a number.
    Number(Option<f64>),
    /// Placeholder for comparator keys.
    Deferred,
}

impl SortValue {
    pub fn from_value(value: &Value, data_type: SortType) -> Self {
        match data_type {
            SortType::Number => SortValue::Number(to_number(value)),
            SortType::Text => SortValue::Text(match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => stencil_joiner::value_text(other),
            }),
        }
    }
}

/// Numeric coercion: numbers, numeric strings and booleans convert; everything else fails.
pub fn to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    n.filter(|n| !n.is_nan())
}

/// Converted numbers precede failures; two failures are equal.
pub(crate) fn compare_numbers(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub(crate) fn compare_text(a: &str, b: &str, key: &SortKey) -> Ordering {
    match key.locale {
        Some(_) => collate(a, b, key.locale_options),
        None => a.cmp(b),
    }
}

pub(crate) fn compare_values(a: &SortValue, b: &SortValue, key: &SortKey) -> Ordering {
    let ordering = match (a, b) {
        (SortValue::Number(x), SortValue::Number(y)) => compare_numbers(*x, *y),
        (SortValue::Text(x), SortValue::Text(y)) => compare_text(x, y, key),
        _ => Ordering::Equal,
    };
    match key.order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

fn base_letters(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase).collect()
}

fn accented(s: &str) -> String {
    s.nfd().flat_map(char::to_lowercase).collect()
}

fn unaccented(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lower case before upper case, otherwise ordinal.
fn compare_case(a: &str, b: &str) -> Ordering {
    for (x, y) in a.chars().zip(b.chars()) {
        if x == y {
            continue;
        }
        let folded = x.to_lowercase().cmp(y.to_lowercase());
        if folded != Ordering::Equal {
            return x.cmp(&y);
        }
        return match (x.is_lowercase(), y.is_lowercase()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => x.cmp(&y),
        };
    }
    a.chars().count().cmp(&b.chars().count())
}

/// Compares strings with digit runs ordered by numeric value.
fn compare_natural(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let take_digits = |it: &mut std::iter::Peekable<std::str::Chars<'_>>| {
                    let mut run = String::new();
                    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
                        run.push(c);
                        it.next();
                    }
                    run
                };
                let (dx, dy) = (take_digits(&mut left), take_digits(&mut right));
                let (tx, ty) = (dx.trim_start_matches('0'), dy.trim_start_matches('0'));
                let ordering = tx.len().cmp(&ty.len()).then_with(|| tx.cmp(ty));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                left.next();
                right.next();
            }
        }
    }
}

/// Locale-aware comparison: base letters first, then accents, then case.
pub fn collate(a: &str, b: &str, options: LocaleOptions) -> Ordering {
    let primary = |x: &str, y: &str| {
        let (bx, by) = (base_letters(x), base_letters(y));
        if options.numeric {
            compare_natural(&bx, &by)
        } else {
            bx.cmp(&by)
        }
    };
    let ordering = primary(a, b);
    if ordering != Ordering::Equal {
        return ordering;
    }
    match options.sensitivity {
        Sensitivity::Base => Ordering::Equal,
        Sensitivity::Accent => accented(a).cmp(&accented(b)),
        Sensitivity::Case => compare_case(&unaccented(a), &unaccented(b)),
        Sensitivity::Variant => accented(a)
            .cmp(&accented(b))
            .then_with(|| compare_case(&a.nfc().collect::<String>(), &b.nfc().collect::<String>())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_coercion() {
        assert_eq!(to_number(&json!(2)), Some(2.0));
        assert_eq!(to_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(to_number(&json!(true)), Some(1.0));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!("")), None);
        assert_eq!(to_number(&json!(null)), None);
    }

    #[test]
    fn test_failed_numbers_sort_last() {
        assert_eq!(compare_numbers(Some(9.0), None), Ordering::Less);
        assert_eq!(compare_numbers(None, Some(1.0)), Ordering::Greater);
        assert_eq!(compare_numbers(None, None), Ordering::Equal);
    }

    #[test]
    fn test_descending_negates() {
        let key = SortKey::new("v").numeric().descending();
        let a = SortValue::from_value(&json!(5), SortType::Number);
        let b = SortValue::from_value(&json!(8), SortType::Number);
        assert_eq!(compare_values(&a, &b, &key), Ordering::Greater);
    }

    #[test]
    fn test_text_null_is_empty() {
        assert_eq!(
            SortValue::from_value(&json!(null), SortType::Text),
            SortValue::Text(String::new())
        );
    }

    #[test]
    fn test_collation_sensitivity() {
        let base = LocaleOptions {
            sensitivity: Sensitivity::Base,
            numeric: false,
        };
        assert_eq!(collate("resume", "Résumé", base), Ordering::Equal);
        assert_eq!(collate("b", "á", base), Ordering::Greater);

        let variant = LocaleOptions::default();
        assert_eq!(collate("a", "A", variant), Ordering::Less);
        assert_eq!(collate("e", "é", variant), Ordering::Less);
        assert_eq!(collate("Zebra", "apple", variant), Ordering::Greater);
    }

    #[test]
    fn test_numeric_collation() {
        let numeric = LocaleOptions {
            sensitivity: Sensitivity::Base,
            numeric: true,
        };
        assert_eq!(collate("item 10", "item 9", numeric), Ordering::Greater);
        assert_eq!(collate("item 010", "item 10", numeric), Ordering::Equal);
    }

    #[test]
    fn test_descriptor_deserialization() {
        let key: SortKey = serde_json::from_value(json!({
            "select": "name", "order": "descending", "type": "text",
            "locale": "en", "localeOptions": { "sensitivity": "base" }
        }))
        .unwrap();
        assert_eq!(key.order, SortOrder::Descending);
        assert_eq!(key.locale_options.sensitivity, Sensitivity::Base);
        let unknown_type = json!({ "select": "x", "type": "date" });
        assert!(serde_json::from_value::<SortKey>(unknown_type).is_err());
    }
}
