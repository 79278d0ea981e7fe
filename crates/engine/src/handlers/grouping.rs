use crate::adapter::{Match, NodeAdapter};
use crate::context::{DispatchContext, GroupingState};
use crate::error::TransformError;
use crate::group::{self, Group, GroupSpec};
use crate::sort::SortSpec;
use serde_json::Value;

impl<A: NodeAdapter> DispatchContext<A> {
    /// Partitions the nodes `selector` yields and runs `body` once per group.
    ///
    /// The optional sort reorders members within each group only. While `body` runs,
    /// the group's first member is the current node and [`current_group`](Self::current_group)
    /// and [`current_grouping_key`](Self::current_grouping_key) describe the group.
    pub fn for_each_group<F>(
        &mut self,
        selector: &str,
        spec: &GroupSpec,
        sort: Option<&SortSpec<A>>,
        mut body: F,
    ) -> Result<(), TransformError>
    where
        F: FnMut(&mut Self, &Group<Match<A::Node>>) -> Result<(), TransformError>,
    {
        let spec = spec.resolve()?;
        let matches = self.select(selector)?;
        let groups = match &spec {
            GroupSpec::GroupBy(key) => group::group_by(self.keyed(matches, key)?),
            GroupSpec::GroupAdjacent(key) => group::group_adjacent(self.keyed(matches, key)?),
            GroupSpec::GroupStartingWith(test) => {
                group::group_starting_with(self.tested(matches, test)?)
            }
            GroupSpec::GroupEndingWith(test) => {
                group::group_ending_with(self.tested(matches, test)?)
            }
            GroupSpec::Declarative(value) => {
                let message = format!("unresolved specification {}", value);
                return Err(TransformError::InvalidGroupSpec(message));
            }
        };
        log::debug!("Grouping '{}' produced {} group(s)", selector, groups.len());

        for mut group in groups {
            if let Some(sort) = sort {
                group.members = self.sort_matches(group.members, sort)?;
            }
            let first = group.members.first().cloned().unwrap_or_else(|| self.current.clone());
            let saved = self.grouping.replace(GroupingState {
                members: group.members.clone(),
                key: group.key.clone(),
            });
            let mode = self.mode.clone();
            let result = self.visit(first, mode, |ctx| body(ctx, &group));
            self.grouping = saved;
            result?;
        }
        Ok(())
    }

    /// Members of the group being visited; empty outside `for_each_group`.
    pub fn current_group(&self) -> &[Match<A::Node>] {
        self.grouping
            .as_ref()
            .map(|state| state.members.as_slice())
            .unwrap_or_default()
    }

    /// The key of the group being visited. Boundary strategies use a boolean key.
    pub fn current_grouping_key(&self) -> Option<&Value> {
        self.grouping.as_ref().map(|state| &state.key)
    }

    fn keyed(
        &self,
        matches: Vec<Match<A::Node>>,
        selector: &str,
    ) -> Result<Vec<(Match<A::Node>, Value)>, TransformError> {
        matches
            .into_iter()
            .map(|m| {
                let key = self.key_value(&m, selector)?;
                Ok((m, key))
            })
            .collect()
    }

    fn tested(
        &self,
        matches: Vec<Match<A::Node>>,
        selector: &str,
    ) -> Result<Vec<(Match<A::Node>, bool)>, TransformError> {
        matches
            .into_iter()
            .map(|m| {
                let passed = self.adapter.test(&m, selector, &self.variables)?;
                Ok((m, passed))
            })
            .collect()
    }
}
