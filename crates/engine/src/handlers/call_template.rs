use crate::adapter::NodeAdapter;
use crate::context::DispatchContext;
use crate::error::TransformError;
use crate::registry::RuleInfo;
use crate::scope::{Param, ParamValue};
use serde_json::Value;
use std::rc::Rc;

impl<A: NodeAdapter> DispatchContext<A> {
    /// Invokes a rule by name against the current node.
    ///
    /// Selector parameters are evaluated against the current node before the call.
    /// Resolved parameters are readable through [`params`](Self::params) and are
    /// also bound as variables for the duration of the call.
    pub fn call_template(
        &mut self,
        name: &str,
        params: &[(&str, Param)],
    ) -> Result<(), TransformError> {
        let rule = self
            .registry
            .named(name)
            .cloned()
            .ok_or_else(|| TransformError::TemplateNotFound(name.to_string()))?;

        let mut resolved = Vec::with_capacity(params.len());
        for (param_name, param) in params {
            let value = match param {
                Param::Literal(value) => ParamValue::Value(value.clone()),
                Param::Select(selector) => ParamValue::Nodes(self.select(selector)?),
            };
            resolved.push((param_name.to_string(), value));
        }
        log::debug!("Calling template '{}' with {} parameter(s)", name, resolved.len());

        let info = RuleInfo {
            mode: self.mode.clone(),
            parent: self.current.parent.clone(),
            parent_slot: self.current.parent_slot.clone(),
            path: self.current.path.clone(),
        };
        let node = self.current.value.clone();
        let body = Rc::clone(&rule.body);

        self.variables.push();
        for (param_name, value) in &resolved {
            self.variables.set(param_name.clone(), value.clone());
        }
        let saved = std::mem::replace(&mut self.params, resolved);
        let result = body(self, &node, &info);
        self.params = saved;
        self.variables.pop();

        if let Some(value) = result? {
            self.joiner.append(value)?;
        }
        Ok(())
    }

    /// The parameters of the innermost `call_template`.
    pub fn params(&self) -> &[(String, ParamValue<A::Node>)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue<A::Node>> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// A parameter as JSON, with nodes atomized.
    pub fn param_value(&self, name: &str) -> Option<Value> {
        self.param(name)
            .map(|value| value.to_value(|node| self.adapter.atomize(node)))
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::{RuleDeclaration, RuleInfo};
    use crate::scope::Param;
    use crate::testing::{TreeAdapter, context, run};
    use crate::{DispatchContext, TransformError};
    use serde_json::{Value, json};

    fn greet() -> RuleDeclaration<TreeAdapter> {
        RuleDeclaration::named(
            "greet",
            |ctx: &mut DispatchContext<TreeAdapter>, node: &Value, _: &RuleInfo| {
                let who = ctx.param_value("who").unwrap_or(json!("nobody"));
                assert_eq!(ctx.variable_value("who"), ctx.param_value("who"));
                Ok(Some(json!({ "hello": who, "at": node["id"] })))
            },
        )
    }

    #[test]
    fn test_call_template_with_literal_and_selected_params() {
        let rules = vec![
            RuleDeclaration::new(
                "$",
                |ctx: &mut DispatchContext<TreeAdapter>, _: &Value, _: &RuleInfo| {
                    ctx.call_template("greet", &[("who", Param::Literal(json!("ada")))])?;
                    ctx.call_template("greet", &[("who", Param::Select("name".into()))])?;
                    ctx.call_template("greet", &[])?;
                    assert!(ctx.params().is_empty());
                    Ok(None)
                },
            ),
            greet(),
        ];
        let mut ctx = context(json!({ "id": 7, "name": "bo" }), rules);
        assert_eq!(
            run(&mut ctx, None),
            json!([
                { "hello": "ada", "at": 7 },
                { "hello": "bo", "at": 7 },
                { "hello": "nobody", "at": 7 }
            ])
        );
    }

    #[test]
    fn test_named_rules_are_not_dispatched() {
        let mut ctx = context(json!({ "id": 1 }), vec![greet().with_name("other")]);
        assert_eq!(run(&mut ctx, None), json!([1]));
    }

    #[test]
    fn test_missing_template() {
        let rules = vec![RuleDeclaration::new(
            "$",
            |ctx: &mut DispatchContext<TreeAdapter>, _: &Value, _: &RuleInfo| {
                ctx.call_template("absent", &[])?;
                Ok(None)
            },
        )];
        let mut ctx = context(json!({}), rules);
        assert_eq!(ctx.transform(None), Err(TransformError::TemplateNotFound("absent".into())));
    }
}
