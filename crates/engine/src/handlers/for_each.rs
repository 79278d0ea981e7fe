use crate::adapter::{Match, NodeAdapter};
use crate::context::DispatchContext;
use crate::error::TransformError;
use crate::sort::{CompiledKey, SortSpec, SortValue, compare_values};
use serde_json::Value;
use std::cmp::Ordering;

impl<A: NodeAdapter> DispatchContext<A> {
    /// Runs `body` once per node `selector` yields, with that node as the current one.
    /// No rule lookup takes place.
    pub fn for_each<F>(
        &mut self,
        selector: &str,
        sort: Option<&SortSpec<A>>,
        mut body: F,
    ) -> Result<(), TransformError>
    where
        F: FnMut(&mut Self, &Match<A::Node>) -> Result<(), TransformError>,
    {
        let matches = self.select(selector)?;
        let matches = match sort {
            Some(spec) => self.sort_matches(matches, spec)?,
            None => matches,
        };
        for target in matches {
            let mode = self.mode.clone();
            self.visit(target.clone(), mode, |ctx| body(ctx, &target))?;
        }
        Ok(())
    }

    /// Evaluates a sort or group key: `.` and `@` denote the node itself.
    pub(crate) fn key_value(
        &self,
        target: &Match<A::Node>,
        selector: &str,
    ) -> Result<Value, TransformError> {
        match selector.trim() {
            "." | "@" => Ok(self.adapter.atomize(&target.value)),
            selector => self.adapter.evaluate_value(target, selector, &self.variables),
        }
    }

    /// Stable sort by every key of `spec`, left to right.
    pub fn sort_matches(
        &self,
        matches: Vec<Match<A::Node>>,
        spec: &SortSpec<A>,
    ) -> Result<Vec<Match<A::Node>>, TransformError> {
        let keys = spec.compile()?;
        let mut rows: Vec<(Match<A::Node>, Vec<SortValue>)> = Vec::with_capacity(matches.len());
        for target in matches {
            let mut values = Vec::with_capacity(keys.len());
            for key in &keys {
                values.push(match key {
                    CompiledKey::Key(key) => {
                        let value = self.key_value(&target, &key.select)?;
                        SortValue::from_value(&value, key.data_type)
                    }
                    CompiledKey::Comparator(_) => SortValue::Deferred,
                });
            }
            rows.push((target, values));
        }

        rows.sort_by(|(a, a_values), (b, b_values)| {
            for (i, key) in keys.iter().enumerate() {
                let ordering = match key {
                    CompiledKey::Key(key) => compare_values(&a_values[i], &b_values[i], key),
                    CompiledKey::Comparator(compare) => compare(self, a, b),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        Ok(rows.into_iter().map(|(target, _)| target).collect())
    }
}
