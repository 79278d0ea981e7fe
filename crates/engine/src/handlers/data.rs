use crate::adapter::{Match, NodeAdapter};
use crate::context::{DispatchContext, KeyDefinition};
use crate::error::TransformError;
use serde_json::Value;
use std::collections::HashMap;

impl<A: NodeAdapter> DispatchContext<A> {
    /// The nodes `selector` yields relative to the current node.
    pub fn select(&self, selector: &str) -> Result<Vec<Match<A::Node>>, TransformError> {
        self.adapter.evaluate(&self.current, selector, &self.variables)
    }

    /// The string value of the first node `selector` yields, or `""`.
    pub fn string_value(&self, selector: &str) -> Result<String, TransformError> {
        Ok(self
            .select(selector)?
            .first()
            .map(|m| self.adapter.string_value(&m.value))
            .unwrap_or_default())
    }

    /// Emits the string value of the first node `selector` yields.
    pub fn value_of(&mut self, selector: &str) -> Result<(), TransformError> {
        let text = self.string_value(selector)?;
        Ok(self.joiner.string(&text)?)
    }

    /// Deep-copies every node `selector` yields into the output.
    pub fn copy_of(&mut self, selector: &str) -> Result<(), TransformError> {
        for target in self.select(selector)? {
            self.adapter.copy_to(&target, self.joiner.as_mut())?;
        }
        Ok(())
    }

    /// Registers a key: nodes matching `match_selector`, indexed by the string value of
    /// `use_selector`.
    pub fn key(&mut self, name: &str, match_selector: &str, use_selector: &str) {
        self.keys.insert(
            name.to_string(),
            KeyDefinition {
                match_selector: match_selector.to_string(),
                use_selector: use_selector.to_string(),
            },
        );
        self.key_indexes.remove(name);
    }

    /// The nodes a key maps `value` to. The index is built on first use.
    pub fn get_key(
        &mut self,
        name: &str,
        value: &str,
    ) -> Result<Vec<Match<A::Node>>, TransformError> {
        if !self.key_indexes.contains_key(name) {
            let index = self.build_key_index(name)?;
            self.key_indexes.insert(name.to_string(), index);
        }
        Ok(self
            .key_indexes
            .get(name)
            .and_then(|index| index.get(value))
            .cloned()
            .unwrap_or_default())
    }

    fn build_key_index(
        &self,
        name: &str,
    ) -> Result<HashMap<String, Vec<Match<A::Node>>>, TransformError> {
        let definition = self
            .keys
            .get(name)
            .ok_or_else(|| TransformError::UnknownKey(name.to_string()))?;
        let mut index: HashMap<String, Vec<Match<A::Node>>> = HashMap::new();
        for target in self.adapter.pattern_matches(&definition.match_selector)? {
            let used = self.key_value(&target, &definition.use_selector)?;
            let values = match used {
                Value::Array(items) => items,
                other => vec![other],
            };
            for value in values {
                index
                    .entry(stencil_joiner::value_text(&value))
                    .or_default()
                    .push(target.clone());
            }
        }
        log::debug!("Built key index '{}' with {} value(s)", name, index.len());
        Ok(index)
    }

    /// Writes `value` into the input at `target`'s position. Cached rule matches and
    /// key indexes are discarded since they may no longer hold.
    pub fn replace_in_parent(
        &mut self,
        target: &Match<A::Node>,
        value: Value,
    ) -> Result<(), TransformError> {
        let node = self.adapter.replace_in_parent(target, value)?;
        self.invalidate_caches();
        if target.path == self.current.path {
            self.current.value = node;
        }
        Ok(())
    }

    pub fn replace_current(&mut self, value: Value) -> Result<(), TransformError> {
        let target = self.current.clone();
        self.replace_in_parent(&target, value)
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::{RuleDeclaration, RuleInfo};
    use crate::testing::{TreeAdapter, context, run};
    use crate::{DispatchContext, TransformError};
    use serde_json::{Value, json};

    fn team() -> Value {
        json!({ "people": [
            { "id": "a", "team": "red", "tags": ["x", "y"] },
            { "id": "b", "team": "blue", "tags": ["y"] },
            { "id": "c", "team": "red", "tags": [] }
        ]})
    }

    fn ids(matches: &[crate::Match<Value>]) -> Vec<Value> {
        matches.iter().map(|m| m.value["id"].clone()).collect()
    }

    #[test]
    fn test_value_of_and_copy_of() {
        let rules = vec![RuleDeclaration::new(
            "$",
            |ctx: &mut DispatchContext<TreeAdapter>, _: &Value, _: &RuleInfo| {
                ctx.value_of("name")?;
                ctx.value_of("missing")?;
                ctx.value_of("n")?;
                ctx.copy_of("items")?;
                Ok(None)
            },
        )];
        let mut ctx = context(json!({ "name": "ada", "n": 2, "items": [1, { "k": true }] }), rules);
        assert_eq!(run(&mut ctx, None), json!(["ada", "", "2", [1, { "k": true }]]));
    }

    #[test]
    fn test_keys_index_by_use_value() {
        let mut ctx = context(team(), vec![]);
        ctx.key("by-team", "?team", "team");
        ctx.key("by-tag", "?tags", "tags");
        assert_eq!(ids(&ctx.get_key("by-team", "red").unwrap()), vec![json!("a"), json!("c")]);
        assert_eq!(ids(&ctx.get_key("by-tag", "y").unwrap()), vec![json!("a"), json!("b")]);
        assert!(ctx.get_key("by-team", "green").unwrap().is_empty());
        assert_eq!(ctx.get_key("nope", "x"), Err(TransformError::UnknownKey("nope".into())));
    }

    #[test]
    fn test_replace_updates_input_and_caches() {
        let mut ctx = context(team(), vec![]);
        ctx.key("by-team", "?team", "team");
        assert_eq!(ctx.get_key("by-team", "blue").unwrap().len(), 1);

        let target = ctx.select("$.people.1.team").unwrap().remove(0);
        ctx.replace_in_parent(&target, json!("red")).unwrap();
        assert_eq!(ctx.string_value("$.people.1.team").unwrap(), "red");
        assert!(ctx.get_key("by-team", "blue").unwrap().is_empty());
        assert_eq!(ctx.get_key("by-team", "red").unwrap().len(), 3);
    }

    #[test]
    fn test_replace_current_inside_rule() {
        let rules = vec![RuleDeclaration::new(
            "n",
            |ctx: &mut DispatchContext<TreeAdapter>, _: &Value, _: &RuleInfo| {
                ctx.replace_current(json!(10))?;
                Ok(Some(ctx.current().value.clone()))
            },
        )];
        let mut ctx = context(json!({ "n": 1 }), rules);
        assert_eq!(run(&mut ctx, None), json!([10]));
        assert_eq!(ctx.adapter().data, json!({ "n": 10 }));
    }
}
