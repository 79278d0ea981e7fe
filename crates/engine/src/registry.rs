//! The immutable rule set a run dispatches against.
use crate::adapter::{NodeAdapter, Slot};
use crate::context::DispatchContext;
use crate::error::TransformError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// What a rule body learns about the node it was invoked for.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleInfo {
    pub mode: Option<String>,
    pub parent: Option<String>,
    pub parent_slot: Option<Slot>,
    pub path: String,
}

/// A rule body. A returned value is appended to the output.
pub type RuleBody<A> = Rc<
    dyn Fn(
        &mut DispatchContext<A>,
        &<A as NodeAdapter>::Node,
        &RuleInfo,
    ) -> Result<Option<Value>, TransformError>,
>;

/// A rule as written by the caller.
pub struct RuleDeclaration<A: NodeAdapter> {
    pub selector: Option<String>,
    pub name: Option<String>,
    pub mode: Option<String>,
    pub priority: Option<f64>,
    pub body: RuleBody<A>,
}

impl<A: NodeAdapter> RuleDeclaration<A> {
    pub fn new<F>(selector: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut DispatchContext<A>, &A::Node, &RuleInfo) -> Result<Option<Value>, TransformError>
            + 'static,
    {
        Self {
            selector: Some(selector.into()),
            name: None,
            mode: None,
            priority: None,
            body: Rc::new(body),
        }
    }

    /// A rule reachable only through `call_template`.
    pub fn named<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut DispatchContext<A>, &A::Node, &RuleInfo) -> Result<Option<Value>, TransformError>
            + 'static,
    {
        Self {
            selector: None,
            name: Some(name.into()),
            mode: None,
            priority: None,
            body: Rc::new(body),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn in_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }
}

impl<A, S, F> From<(S, F)> for RuleDeclaration<A>
where
    A: NodeAdapter,
    S: Into<String>,
    F: Fn(&mut DispatchContext<A>, &A::Node, &RuleInfo) -> Result<Option<Value>, TransformError>
        + 'static,
{
    fn from((selector, body): (S, F)) -> Self {
        RuleDeclaration::new(selector, body)
    }
}

pub struct TemplateRule<A: NodeAdapter> {
    pub selector: Option<String>,
    pub name: Option<String>,
    pub mode: Option<String>,
    pub priority: Option<f64>,
    pub body: RuleBody<A>,
    /// Position in the caller's declaration list; later rules win exact ties.
    pub declared_index: usize,
}

impl<A: NodeAdapter> fmt::Debug for TemplateRule<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRule")
            .field("selector", &self.selector)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("priority", &self.priority)
            .field("declared_index", &self.declared_index)
            .finish()
    }
}

impl<A: NodeAdapter> TemplateRule<A> {
    /// A label for diagnostics.
    pub fn describe(&self) -> String {
        match (&self.selector, &self.name) {
            (Some(selector), Some(name)) => format!("{} ({})", selector, name),
            (Some(selector), None) => selector.clone(),
            (None, Some(name)) => format!("#{}", name),
            (None, None) => format!("rule {}", self.declared_index),
        }
    }
}

pub struct RuleRegistry<A: NodeAdapter> {
    root_rules: Vec<Rc<TemplateRule<A>>>,
    general_rules: Vec<Rc<TemplateRule<A>>>,
    by_name: HashMap<String, Rc<TemplateRule<A>>>,
}

impl<A: NodeAdapter> fmt::Debug for RuleRegistry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("root_rules", &self.root_rules)
            .field("general_rules", &self.general_rules)
            .finish()
    }
}

impl<A: NodeAdapter> RuleRegistry<A> {
    /// Partitions the declarations into root and general rules, keeping their order.
    pub fn new(adapter: &A, declarations: Vec<RuleDeclaration<A>>) -> Result<Self, TransformError> {
        let mut registry = Self {
            root_rules: Vec::new(),
            general_rules: Vec::new(),
            by_name: HashMap::new(),
        };
        for (declared_index, decl) in declarations.into_iter().enumerate() {
            let rule = Rc::new(TemplateRule {
                selector: decl.selector,
                name: decl.name,
                mode: decl.mode,
                priority: decl.priority,
                body: decl.body,
                declared_index,
            });
            if let Some(name) = &rule.name {
                if registry.by_name.contains_key(name) {
                    return Err(TransformError::DuplicateTemplateName(name.clone()));
                }
                registry.by_name.insert(name.clone(), Rc::clone(&rule));
            }
            match &rule.selector {
                Some(selector) if adapter.is_root_selector(selector) => {
                    registry.root_rules.push(rule)
                }
                _ => registry.general_rules.push(rule),
            }
        }
        log::debug!(
            "Registered {} root rule(s) and {} general rule(s)",
            registry.root_rules.len(),
            registry.general_rules.len()
        );
        Ok(registry)
    }

    pub fn root_rules(&self) -> &[Rc<TemplateRule<A>>] {
        &self.root_rules
    }

    pub fn general_rules(&self) -> &[Rc<TemplateRule<A>>] {
        &self.general_rules
    }

    pub fn named(&self, name: &str) -> Option<&Rc<TemplateRule<A>>> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.root_rules.len() + self.general_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
