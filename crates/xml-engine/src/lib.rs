//! Rule-based transformation of XML documents.
//!
//! Rule selectors are XPath 1.0 patterns: relative patterns such as `item` or
//! `@price` match anywhere in the document, `/` matches the root. Selectors passed
//! to the dispatch operations are ordinary XPath expressions evaluated from the
//! current node. Matches are identified by document paths like `/catalog[1]/item[2]`.

pub mod adapter;
pub mod processor;

pub use adapter::XmlAdapter;
pub use processor::XmlProcessor;
pub use stencil_xpath::{NodeId, ParseOptions, XmlDocument};

/// The dispatch context specialized to XML input.
pub type XmlContext = stencil_engine::DispatchContext<XmlAdapter>;
/// A rule over XML input.
pub type XmlRule = stencil_engine::RuleDeclaration<XmlAdapter>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stencil_engine::{
        DomJoiner, GroupSpec, NodeAdapter, Output, OutputConfig, RuleInfo, SortKey, SortSpec, StringJoiner,
        TransformError,
    };

    const CATALOG: &str = concat!(
        r#"<catalog><item id="1" price="10">Pen</item><item id="2" price="3">Ink</item>"#,
        r#"<item id="3" price="7">Pad</item></catalog>"#
    );

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn bare() -> Box<StringJoiner> {
        Box::new(StringJoiner::with_config(OutputConfig {
            omit_xml_declaration: Some(true),
            ..Default::default()
        }))
    }

    fn text(output: Output) -> String {
        output.to_text().unwrap()
    }

    #[test]
    fn test_rules_rebuild_markup() {
        init();
        let rules = vec![
            XmlRule::new("/", |ctx: &mut XmlContext, _: &NodeId, _: &RuleInfo| {
                ctx.element("list", &[], |ctx| {
                    ctx.apply_templates(Some("catalog/item"), None, None)
                })?;
                Ok(None)
            }),
            XmlRule::new("item", |ctx: &mut XmlContext, _: &NodeId, _: &RuleInfo| {
                ctx.element("li", &[], |ctx| ctx.value_of("."))?;
                Ok(None)
            }),
            XmlRule::new("item[@id='2']", |ctx: &mut XmlContext, _: &NodeId, info: &RuleInfo| {
                ctx.element("li", &[("class", "picked")], |ctx| ctx.string(&info.path))?;
                Ok(None)
            }),
        ];
        let output = XmlProcessor::new(rules)
            .transform_str(CATALOG, Box::new(StringJoiner::new()))
            .unwrap();
        assert_eq!(
            text(output),
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?><list><li>Pen</li>"#,
                r#"<li class="picked">/catalog[1]/item[2]</li><li>Pad</li></list>"#
            )
        );
    }

    #[test]
    fn test_builtin_rules_emit_text_only() {
        init();
        let output = XmlProcessor::new(vec![])
            .transform_str("<a>x<b>y</b><!--c--><?p q?></a>", Box::new(StringJoiner::new()))
            .unwrap();
        assert_eq!(output, Output::Text("xy".into()));
    }

    #[test]
    fn test_whitespace_stripping() {
        let output = XmlProcessor::new(vec![])
            .with_parse_options(ParseOptions { strip_whitespace: true })
            .transform_str("<a>\n  <b>1</b>\n  <b>2</b>\n</a>", Box::new(StringJoiner::new()))
            .unwrap();
        assert_eq!(output, Output::Text("12".into()));
    }

    #[test]
    fn test_invalid_input() {
        let result =
            XmlProcessor::new(vec![]).transform_str("<a><b></a>", Box::new(StringJoiner::new()));
        assert!(matches!(result, Err(TransformError::InvalidInput(_))));
    }

    #[test]
    fn test_variables_in_selectors() {
        init();
        let rules = vec![
            XmlRule::new("/", |ctx: &mut XmlContext, _: &NodeId, _: &RuleInfo| {
                ctx.variable("min", json!(5));
                ctx.apply_templates(Some("//item[@price > $min]"), None, None)?;
                Ok(None)
            }),
            XmlRule::new("item", |ctx: &mut XmlContext, node: &NodeId, _: &RuleInfo| {
                let name = ctx.adapter().document().string_value(*node);
                Ok(Some(json!(format!("{};", name))))
            }),
        ];
        let output = XmlProcessor::new(rules).transform_str(CATALOG, bare()).unwrap();
        assert_eq!(text(output), "Pen;Pad;");
    }

    #[test]
    fn test_numeric_sort_by_attribute() {
        init();
        let rules = vec![XmlRule::new("/", |ctx: &mut XmlContext, _: &NodeId, _: &RuleInfo| {
            let by_price = SortSpec::Key(SortKey::new("@price").numeric());
            ctx.for_each("//item", Some(&by_price), |ctx, _| ctx.value_of("."))?;
            ctx.string("|")?;
            let by_price_desc = SortSpec::Key(SortKey::new("@price").numeric().descending());
            ctx.apply_templates(Some("//item"), None, Some(&by_price_desc))?;
            Ok(None)
        })];
        let output = XmlProcessor::new(rules).transform_str(CATALOG, bare()).unwrap();
        assert_eq!(text(output), "InkPadPen|PenPadInk");
    }

    #[test]
    fn test_grouping_by_attribute() {
        init();
        let source =
            r#"<staff><p dept="Eng">A</p><p dept="Sales">B</p><p dept="Eng">C</p></staff>"#;
        let rules = vec![XmlRule::new("/", |ctx: &mut XmlContext, _: &NodeId, _: &RuleInfo| {
            ctx.element("out", &[], |ctx| {
                ctx.for_each_group("//p", &GroupSpec::GroupBy("@dept".into()), None, |ctx, group| {
                    let dept = stencil_joiner::value_text(&group.key);
                    ctx.element("dept", &[("name", dept.as_str())], |ctx| {
                        for member in ctx.current_group().to_vec() {
                            let name = ctx.adapter().string_value(&member.value);
                            ctx.string(&name)?;
                        }
                        Ok(())
                    })
                })
            })?;
            Ok(None)
        })];
        let output = XmlProcessor::new(rules).transform_str(source, bare()).unwrap();
        assert_eq!(
            text(output),
            r#"<out><dept name="Eng">AC</dept><dept name="Sales">B</dept></out>"#
        );
    }

    #[test]
    fn test_replace_then_copy() {
        init();
        let rules = vec![XmlRule::new("/", |ctx: &mut XmlContext, _: &NodeId, _: &RuleInfo| {
            for price in ctx.select("//item/@price")? {
                ctx.replace_in_parent(&price, json!(0))?;
            }
            ctx.copy_of("/catalog/item[1]")?;
            Ok(None)
        })];
        let output = XmlProcessor::new(rules).transform_str(CATALOG, bare()).unwrap();
        assert_eq!(text(output), r#"<item id="1" price="0">Pen</item>"#);
    }

    #[test]
    fn test_dom_output() {
        init();
        let rules = vec![XmlRule::new("/", |ctx: &mut XmlContext, _: &NodeId, _: &RuleInfo| {
            ctx.element("copy", &[], |ctx| ctx.copy_of("//item[@price < 8]"))?;
            Ok(None)
        })];
        let document = XmlDocument::parse(CATALOG).unwrap();
        let output = XmlProcessor::new(rules)
            .transform_into(document, Box::new(DomJoiner::new()))
            .unwrap();
        let doc = output.as_document().unwrap();
        let top = doc.children(doc.root())[0];
        assert_eq!(doc.name(top).unwrap().to_string(), "copy");
        assert_eq!(doc.children(top).len(), 2);
        assert_eq!(doc.string_value(top), "InkPad");
    }
}
