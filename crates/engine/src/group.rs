//! The four grouping strategies, as pure partitions over precomputed keys.
use crate::error::TransformError;
use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum GroupSpec {
    /// Items with identical keys share a group; groups follow first occurrence.
    GroupBy(String),
    /// A new group starts whenever the key differs from the previous item's.
    GroupAdjacent(String),
    /// Items passing the test open a new group.
    GroupStartingWith(String),
    /// Items passing the test close the current group.
    GroupEndingWith(String),
    /// An object with exactly one of `groupBy`, `groupAdjacent`, `groupStartingWith`,
    /// `groupEndingWith`, checked when grouping runs.
    Declarative(Value),
}

impl GroupSpec {
    /// Resolves a declarative specification into one of the four strategies.
    pub fn resolve(&self) -> Result<GroupSpec, TransformError> {
        let GroupSpec::Declarative(value) = self else {
            return Ok(self.clone());
        };
        let object = value.as_object().ok_or_else(|| {
            TransformError::InvalidGroupSpec(format!("expected an object, found {}", value))
        })?;
        let strategies: [(&str, fn(String) -> GroupSpec); 4] = [
            ("groupBy", GroupSpec::GroupBy),
            ("groupAdjacent", GroupSpec::GroupAdjacent),
            ("groupStartingWith", GroupSpec::GroupStartingWith),
            ("groupEndingWith", GroupSpec::GroupEndingWith),
        ];
        let mut found = Vec::new();
        for (key, make) in strategies {
            if let Some(selector) = object.get(key) {
                let selector = selector.as_str().ok_or_else(|| {
                    TransformError::InvalidGroupSpec(format!("'{}' must be a selector string", key))
                })?;
                found.push(make(selector.to_string()));
            }
        }
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(TransformError::InvalidGroupSpec("no grouping key".into())),
            n => Err(TransformError::InvalidGroupSpec(format!(
                "{} grouping keys; exactly one is allowed",
                n
            ))),
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            GroupSpec::GroupBy(s)
            | GroupSpec::GroupAdjacent(s)
            | GroupSpec::GroupStartingWith(s)
            | GroupSpec::GroupEndingWith(s) => Some(s),
            GroupSpec::Declarative(_) => None,
        }
    }

    /// True for the boundary-test strategies.
    pub fn is_boundary(&self) -> bool {
        matches!(self, GroupSpec::GroupStartingWith(_) | GroupSpec::GroupEndingWith(_))
    }
}

/// One emitted group.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<T> {
    pub key: Value,
    pub members: Vec<T>,
}

fn identity(key: &Value) -> String {
    serde_json::to_string(key).unwrap_or_default()
}

pub fn group_by<T>(items: impl IntoIterator<Item = (T, Value)>) -> Vec<Group<T>> {
    let mut groups: IndexMap<String, Group<T>> = IndexMap::new();
    for (item, key) in items {
        groups
            .entry(identity(&key))
            .or_insert_with(|| Group {
                key,
                members: Vec::new(),
            })
            .members
            .push(item);
    }
    groups.into_values().collect()
}

pub fn group_adjacent<T>(items: impl IntoIterator<Item = (T, Value)>) -> Vec<Group<T>> {
    let mut groups: Vec<Group<T>> = Vec::new();
    for (item, key) in items {
        match groups.last_mut() {
            Some(last) if last.key == key => last.members.push(item),
            _ => groups.push(Group {
                key,
                members: vec![item],
            }),
        }
    }
    groups
}

/// Items before the first passing item form a leading group keyed `false`.
pub fn group_starting_with<T>(items: impl IntoIterator<Item = (T, bool)>) -> Vec<Group<T>> {
    let mut groups: Vec<Group<T>> = Vec::new();
    for (item, starts) in items {
        match groups.last_mut() {
            Some(last) if !starts => last.members.push(item),
            _ => groups.push(Group {
                key: Value::Bool(starts),
                members: vec![item],
            }),
        }
    }
    groups
}

/// A trailing run with no passing item is still emitted, keyed `false`.
pub fn group_ending_with<T>(items: impl IntoIterator<Item = (T, bool)>) -> Vec<Group<T>> {
    let mut groups: Vec<Group<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    for (item, ends) in items {
        current.push(item);
        if ends {
            groups.push(Group {
                key: Value::Bool(true),
                members: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        groups.push(Group {
            key: Value::Bool(false),
            members: current,
        });
    }
    groups
}
