use crate::adapter::{Match, NodeAdapter, NodeShape};
use crate::context::{CompiledPattern, DispatchContext};
use crate::error::TransformError;
use crate::priority::resolve_priority;
use crate::registry::{RuleInfo, TemplateRule};
use crate::sort::SortSpec;
use itertools::Itertools;
use std::rc::Rc;

impl<A: NodeAdapter> DispatchContext<A> {
    /// Dispatches each node `selector` yields to its winning rule.
    ///
    /// Without a selector the first call of a run visits the root and later calls
    /// visit the children of the current node. `mode` is taken as given: `None` selects
    /// the rules declared without a mode.
    pub fn apply_templates(
        &mut self,
        selector: Option<&str>,
        mode: Option<&str>,
        sort: Option<&SortSpec<A>>,
    ) -> Result<(), TransformError> {
        self.apply_in_mode(selector, mode.map(str::to_string), sort)
    }

    /// Like [`apply_templates`](Self::apply_templates), staying in the active mode.
    pub fn apply_templates_in_current_mode(
        &mut self,
        selector: Option<&str>,
        sort: Option<&SortSpec<A>>,
    ) -> Result<(), TransformError> {
        let mode = self.mode.clone();
        self.apply_in_mode(selector, mode, sort)
    }

    fn apply_in_mode(
        &mut self,
        selector: Option<&str>,
        mode: Option<String>,
        sort: Option<&SortSpec<A>>,
    ) -> Result<(), TransformError> {
        let matches = match selector {
            Some(selector) => self.select(selector)?,
            None if !self.started => vec![self.adapter.root()],
            None => self.adapter.children(&self.current),
        };
        self.started = true;
        let matches = match sort {
            Some(spec) => self.sort_matches(matches, spec)?,
            None => matches,
        };
        log::debug!(
            "Applying templates to {} node(s) from '{}' in mode {:?}",
            matches.len(),
            self.current.path,
            mode
        );
        for target in matches {
            self.dispatch(target, mode.clone())?;
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        target: Match<A::Node>,
        mode: Option<String>,
    ) -> Result<(), TransformError> {
        let rule = self.find_rule(&target, mode.as_deref())?;
        log::trace!(
            "'{}' -> {}",
            target.path,
            rule.as_ref().map_or_else(|| "built-in rule".to_string(), |r| r.describe())
        );
        self.visit(target, mode, |ctx| match rule {
            Some(rule) => ctx.invoke_rule(&rule),
            None => ctx.apply_builtin_rule(),
        })
    }

    /// Runs a rule body against the current match and appends what it returns.
    pub(crate) fn invoke_rule(&mut self, rule: &TemplateRule<A>) -> Result<(), TransformError> {
        let info = RuleInfo {
            mode: self.mode.clone(),
            parent: self.current.parent.clone(),
            parent_slot: self.current.parent_slot.clone(),
            path: self.current.path.clone(),
        };
        let node = self.current.value.clone();
        let body = Rc::clone(&rule.body);
        if let Some(value) = body(self, &node, &info)? {
            self.joiner.append(value)?;
        }
        Ok(())
    }

    fn apply_builtin_rule(&mut self) -> Result<(), TransformError> {
        match self.adapter.shape(&self.current.value) {
            NodeShape::Container => self.apply_templates_in_current_mode(None, None),
            NodeShape::Scalar | NodeShape::PropertyName => {
                let value = self.adapter.atomize(&self.current.value);
                Ok(self.joiner.append(value)?)
            }
            NodeShape::Opaque => Ok(()),
        }
    }

    /// Picks the rule for one match: same mode, selector covering the match, highest
    /// priority. Exact ties fail in strict mode and otherwise go to the last-declared rule.
    pub(crate) fn find_rule(
        &mut self,
        target: &Match<A::Node>,
        mode: Option<&str>,
    ) -> Result<Option<Rc<TemplateRule<A>>>, TransformError> {
        let registry = Rc::clone(&self.registry);
        let is_root = target.parent.is_none();
        let root_rules = registry.root_rules().iter().filter(|_| is_root);

        let mut candidates: Vec<(f64, &Rc<TemplateRule<A>>)> = Vec::new();
        for rule in root_rules.chain(registry.general_rules()) {
            if rule.mode.as_deref() != mode || rule.selector.is_none() {
                continue;
            }
            let pattern = self.compiled_pattern(rule)?;
            if pattern.paths.contains(&target.path) {
                candidates.push((pattern.priority, rule));
            }
        }

        let Some(top) = candidates.iter().map(|(p, _)| *p).reduce(f64::max) else {
            return Ok(None);
        };
        let tied: Vec<&Rc<TemplateRule<A>>> = candidates
            .into_iter()
            .filter(|(p, _)| *p == top)
            .map(|(_, rule)| rule)
            .collect();
        if tied.len() > 1 {
            if self.options.error_on_equal_priority {
                return Err(TransformError::EqualPriorityTemplates {
                    path: target.path.clone(),
                    priority: top,
                    selectors: tied.iter().map(|r| r.describe()).join(", "),
                });
            }
            log::debug!(
                "{} rules tie at priority {} for '{}'; using the last declared",
                tied.len(),
                top,
                target.path
            );
        }
        Ok(tied.into_iter().max_by_key(|r| r.declared_index).cloned())
    }

    fn compiled_pattern(
        &mut self,
        rule: &TemplateRule<A>,
    ) -> Result<Rc<CompiledPattern>, TransformError> {
        if let Some(pattern) = self.patterns.get(&rule.declared_index) {
            return Ok(Rc::clone(pattern));
        }
        let selector = rule.selector.as_deref().unwrap_or_default();
        let paths = if self.adapter.is_root_selector(selector) {
            std::iter::once(self.adapter.root().path).collect()
        } else {
            self.adapter
                .pattern_matches(selector)?
                .into_iter()
                .map(|m| m.path)
                .collect()
        };
        let priority = resolve_priority(rule.priority, || match &self.specificity {
            Some(specificity) => Ok(specificity(selector)),
            None => Ok(self.adapter.terminal(selector)?.score()),
        })?;
        let pattern = Rc::new(CompiledPattern { paths, priority });
        self.patterns.insert(rule.declared_index, Rc::clone(&pattern));
        Ok(pattern)
    }
}
