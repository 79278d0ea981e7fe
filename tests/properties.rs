//! Structural guarantees of the registry, the sort engine and the grouping strategies.
mod common;

use common::*;
use serde_json::{Value, json};
use stencil::engine::RuleRegistry;
use stencil::NodeAdapter;
use stencil::json::JsonAdapter;
use stencil::prelude::*;

fn names_in_order(ctx: &JsonContext, selector: &str, sort: &SortSpec<JsonAdapter>) -> Vec<Value> {
    let sorted = ctx.select(selector).and_then(|found| ctx.sort_matches(found, sort)).unwrap();
    sorted.iter().map(|m| m.value.value["name"].clone()).collect()
}

#[test]
fn test_registry_partitions_every_rule() {
    let adapter = JsonAdapter::new(json!({}));
    let rules = vec![
        JsonRule::new("$", emit_json(json!(1))),
        JsonRule::new("$.a", emit_json(json!(2))),
        JsonRule::named("helper", emit_json(json!(3))),
        JsonRule::new("$", emit_json(json!(4))).in_mode("other"),
    ];
    let registry = RuleRegistry::new(&adapter, rules).unwrap();
    assert_eq!(registry.root_rules().len(), 2);
    assert_eq!(registry.general_rules().len(), 2);
    assert_eq!(registry.len(), 4);
    assert!(registry.named("helper").is_some());
}

#[test]
fn test_registry_rejects_duplicate_names() {
    let adapter = JsonAdapter::new(json!({}));
    let rules = vec![
        JsonRule::named("twice", emit_json(json!(1))),
        JsonRule::new("$.a", emit_json(json!(2))).with_name("twice"),
    ];
    match RuleRegistry::new(&adapter, rules) {
        Err(TransformError::DuplicateTemplateName(name)) => assert_eq!(name, "twice"),
        Err(other) => panic!("Expected a duplicate name error, got {:?}", other),
        Ok(_) => panic!("Expected a duplicate name error"),
    }
}

#[test]
fn test_priority_is_stable_across_runs() {
    let adapter = JsonAdapter::new(json!({}));
    let score = || -> Result<f64, TransformError> { Ok(adapter.terminal("$.a[0]")?.score()) };
    let first = stencil::engine::priority::resolve_priority(None, score);
    let second = stencil::engine::priority::resolve_priority(None, score);
    assert_eq!(first.unwrap(), second.unwrap());
}

#[test]
fn test_sorting_is_stable() {
    init();
    let data = json!({ "people": [
        { "name": "a", "team": 2 },
        { "name": "b", "team": 1 },
        { "name": "c", "team": 2 },
        { "name": "d", "team": 1 }
    ]});
    let ctx = JsonProcessor::new(vec![]).context(data, Box::new(JsonJoiner::new())).unwrap();
    let by_team = SortSpec::Key(SortKey::new("team").numeric());
    assert_eq!(names_in_order(&ctx, "$.people[*]", &by_team), vec!["b", "d", "a", "c"]);

    let once = ctx
        .select("$.people[*]")
        .and_then(|found| ctx.sort_matches(found, &by_team))
        .unwrap();
    let twice = ctx.sort_matches(once.clone(), &by_team).unwrap();
    assert_eq!(once, twice);

    let all_equal = SortSpec::Multi(vec![
        SortSpec::Key(SortKey::new("missing")),
        SortSpec::Select("gone".into()),
    ]);
    assert_eq!(names_in_order(&ctx, "$.people[*]", &all_equal), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_grouping_preserves_input_order() {
    init();
    let data = json!({ "xs": [
        { "k": "p", "cut": false },
        { "k": "q", "cut": true },
        { "k": "p", "cut": false },
        { "k": "p", "cut": true },
        { "k": "q", "cut": false }
    ]});
    let strategies = [
        GroupSpec::GroupAdjacent("k".into()),
        GroupSpec::GroupStartingWith("cut".into()),
        GroupSpec::GroupEndingWith("cut".into()),
        GroupSpec::Declarative(json!({ "groupAdjacent": "k" })),
    ];
    let mut ctx = JsonProcessor::new(vec![]).context(data, Box::new(JsonJoiner::new())).unwrap();
    let original: Vec<String> =
        ctx.select("$.xs[*]").unwrap().into_iter().map(|m| m.path).collect();
    for spec in &strategies {
        let mut seen = Vec::new();
        ctx.for_each_group("$.xs[*]", spec, None, |_, group| {
            seen.extend(group.members.iter().map(|m| m.path.clone()));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, original, "strategy {:?}", spec);
    }

    let mut by_key = Vec::new();
    ctx.for_each_group("$.xs[*]", &GroupSpec::GroupBy("k".into()), None, |_, group| {
        by_key.push((group.key.clone(), group.members.len()));
        Ok(())
    })
    .unwrap();
    assert_eq!(by_key, vec![(json!("p"), 3), (json!("q"), 2)]);
}

#[test]
fn test_invalid_group_spec_is_reported_when_grouping_runs() {
    let mut ctx = JsonProcessor::new(vec![])
        .context(json!({ "xs": [1] }), Box::new(JsonJoiner::new()))
        .unwrap();
    let spec = GroupSpec::Declarative(json!({ "groupBy": "a", "groupAdjacent": "b" }));
    let result = ctx.for_each_group("$.xs[*]", &spec, None, |_, _| Ok(()));
    assert!(matches!(result, Err(TransformError::InvalidGroupSpec(_))));
}
