//! A `nom`-based parser for the JSON path selector language.
use super::ast::{CompareOp, FilterExpr, JsonPath, JsonType, Operand, Origin, Segment, Selector};
use crate::error::JPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, not, opt, peek, recognize},
    error::{Error as NomError, ErrorKind},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};
use serde_json::Value;

// --- Main Public Parser ---

pub fn parse_path(input: &str) -> Result<JsonPath, JPathError> {
    match json_path(input.trim()) {
        Ok(("", path)) => Ok(path),
        Ok((rem, _)) => Err(JPathError::JPathParse(
            input.to_string(),
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(JPathError::JPathParse(input.to_string(), e.to_string())),
    }
}

// --- Paths ---

fn json_path(input: &str) -> IResult<&str, JsonPath> {
    let (input, (origin, segments)) = alt((
        map(preceded(char('$'), many0(segment)), |segs| (Origin::Root, segs)),
        map(many1(segment), |segs| (Origin::Current, segs)),
        map(preceded(char('@'), many0(segment)), |segs| (Origin::Current, segs)),
        map(pair(name, many0(segment)), |(first, mut rest)| {
            let mut segs = vec![Segment::Child(Selector::Name(first.to_string()))];
            segs.append(&mut rest);
            (Origin::Current, segs)
        }),
        map(char('.'), |_| (Origin::Current, Vec::new())),
    ))
    .parse(input)?;
    let (input, tilde) = opt(char('~')).parse(input)?;

    Ok((
        input,
        JsonPath {
            origin,
            segments,
            property_names: tilde.is_some(),
        },
    ))
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-').parse(input)
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((
        map(
            preceded(
                tag(".."),
                alt((
                    map(char('*'), |_| Selector::Wildcard),
                    map(name, |n| Selector::Name(n.to_string())),
                    bracket,
                )),
            ),
            Segment::Descendant,
        ),
        map(
            preceded(
                char('.'),
                alt((
                    map(char('*'), |_| Selector::Wildcard),
                    map(name, |n| Selector::Name(n.to_string())),
                )),
            ),
            Segment::Child,
        ),
        map(bracket, Segment::Child),
        map(type_test, Segment::TypeTest),
    ))
    .parse(input)
}

fn type_test(input: &str) -> IResult<&str, JsonType> {
    map_res(delimited(char('@'), name, tag("()")), |n: &str| {
        JsonType::from_name(n).ok_or("unknown type test")
    })
    .parse(input)
}

// --- Bracket selectors ---

fn bracket(input: &str) -> IResult<&str, Selector> {
    delimited(
        pair(char('['), multispace0),
        alt((filter_selector, union_selector)),
        pair(multispace0, char(']')),
    )
    .parse(input)
}

fn filter_selector(input: &str) -> IResult<&str, Selector> {
    map(preceded(char('?'), ws(filter_expr)), Selector::Filter).parse(input)
}

fn union_selector(input: &str) -> IResult<&str, Selector> {
    map(separated_list1(ws(char(',')), bracket_item), |mut items| {
        if items.len() == 1 {
            items.remove(0)
        } else {
            Selector::Union(items)
        }
    })
    .parse(input)
}

fn bracket_item(input: &str) -> IResult<&str, Selector> {
    alt((
        map(char('*'), |_| Selector::Wildcard),
        slice,
        map(integer, Selector::Index),
        map(quoted, Selector::Name),
    ))
    .parse(input)
}

fn slice(input: &str) -> IResult<&str, Selector> {
    let (input, start) = opt(ws(integer)).parse(input)?;
    let (input, _) = char(':').parse(input)?;
    let (input, end) = opt(ws(integer)).parse(input)?;
    let (input, step) = opt(preceded(char(':'), opt(ws(integer)))).parse(input)?;
    Ok((
        input,
        Selector::Slice {
            start,
            end,
            step: step.flatten(),
        },
    ))
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>).parse(input)
}

/// A single- or double-quoted string with backslash escapes.
fn quoted(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('\'' | '"'))) => c,
        _ => return Err(nom::Err::Error(NomError::new(input, ErrorKind::Char))),
    };
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)))
}

// --- Filter expressions ---

fn filter_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), and_expr)).parse(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, next| FilterExpr::Or(Box::new(acc), Box::new(next))),
    ))
}

fn and_expr(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = unary_expr(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), unary_expr)).parse(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, next| FilterExpr::And(Box::new(acc), Box::new(next))),
    ))
}

fn unary_expr(input: &str) -> IResult<&str, FilterExpr> {
    alt((
        map(
            preceded(ws(terminated(char('!'), not(char('=')))), unary_expr),
            |e| FilterExpr::Not(Box::new(e)),
        ),
        delimited(ws(char('(')), filter_expr, ws(char(')'))),
        comparison,
    ))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, FilterExpr> {
    let (input, left) = ws(operand).parse(input)?;
    let (input, rhs) = opt(pair(ws(compare_op), ws(operand))).parse(input)?;
    Ok((
        input,
        match rhs {
            Some((op, right)) => FilterExpr::Compare { left, op, right },
            None => FilterExpr::Exists(left),
        },
    ))
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        map(tag("==="), |_| CompareOp::Equals),
        map(tag("!=="), |_| CompareOp::NotEquals),
        map(tag("=="), |_| CompareOp::Equals),
        map(tag("!="), |_| CompareOp::NotEquals),
        map(tag("<="), |_| CompareOp::LessThanOrEqual),
        map(tag(">="), |_| CompareOp::GreaterThanOrEqual),
        map(tag("<"), |_| CompareOp::LessThan),
        map(tag(">"), |_| CompareOp::GreaterThan),
    ))
    .parse(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(literal, Operand::Literal),
        map(preceded(char('$'), many0(segment)), |segments| {
            Operand::Path(JsonPath {
                origin: Origin::Root,
                segments,
                property_names: false,
            })
        }),
        map(preceded(char('@'), many0(segment)), |segments| {
            Operand::Path(JsonPath {
                origin: Origin::Current,
                segments,
                property_names: false,
            })
        }),
    ))
    .parse(input)
}

fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = NomError<&'a str>> {
    terminated(
        tag(word),
        not(peek(take_while1(|c: char| c.is_alphanumeric() || c == '_'))),
    )
}

fn literal(input: &str) -> IResult<&str, Value> {
    alt((
        map(keyword("true"), |_| Value::Bool(true)),
        map(keyword("false"), |_| Value::Bool(false)),
        map(keyword("null"), |_| Value::Null),
        map(quoted, Value::String),
        number,
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
            opt((alt((char('e'), char('E'))), opt(alt((char('+'), char('-')))), digit1)),
        )),
        |text: &str| -> Result<Value, std::num::ParseFloatError> {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::from(i));
            }
            text.parse::<f64>().map(Value::from)
        },
    )
    .parse(input)
}

/// A combinator that takes a parser `inner` and produces a parser that consumes surrounding
/// whitespace.
fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_and_children() {
        let path = parse_path("$.store.book[0]").unwrap();
        assert_eq!(path.origin, Origin::Root);
        assert_eq!(
            path.segments,
            vec![
                Segment::Child(Selector::Name("store".into())),
                Segment::Child(Selector::Name("book".into())),
                Segment::Child(Selector::Index(0)),
            ]
        );
        assert!(!path.property_names);
    }

    #[test]
    fn test_relative_forms() {
        assert_eq!(parse_path(".").unwrap().segments, vec![]);
        assert_eq!(parse_path("@").unwrap().origin, Origin::Current);
        let rel = parse_path("name.first").unwrap();
        assert_eq!(rel.origin, Origin::Current);
        assert_eq!(rel.segments.len(), 2);
        let desc = parse_path("..price").unwrap();
        assert_eq!(
            desc.segments,
            vec![Segment::Descendant(Selector::Name("price".into()))]
        );
    }

    #[test]
    fn test_brackets_unions_and_slices() {
        let path = parse_path("$['a b', \"c\"][1:3][-1][*]").unwrap();
        assert_eq!(
            path.segments,
            vec![
                Segment::Child(Selector::Union(vec![
                    Selector::Name("a b".into()),
                    Selector::Name("c".into())
                ])),
                Segment::Child(Selector::Slice {
                    start: Some(1),
                    end: Some(3),
                    step: None
                }),
                Segment::Child(Selector::Index(-1)),
                Segment::Child(Selector::Wildcard),
            ]
        );
    }

    #[test]
    fn test_filter_expression() {
        let path = parse_path("$.items[?(@.price < 10 && @.tag == 'x')]").unwrap();
        match &path.segments[1] {
            Segment::Child(Selector::Filter(FilterExpr::And(left, _))) => {
                assert_eq!(
                    **left,
                    FilterExpr::Compare {
                        left: Operand::Path(JsonPath {
                            origin: Origin::Current,
                            segments: vec![Segment::Child(Selector::Name("price".into()))],
                            property_names: false,
                        }),
                        op: CompareOp::LessThan,
                        right: Operand::Literal(json!(10)),
                    }
                );
            }
            other => panic!("Expected an And filter, got {:?}", other),
        }
        assert!(path.uses_filters());
    }

    #[test]
    fn test_type_test_and_property_names() {
        let path = parse_path("$..*@string()").unwrap();
        assert_eq!(path.segments.last(), Some(&Segment::TypeTest(JsonType::String)));
        let names = parse_path("$.a.*~").unwrap();
        assert!(names.property_names);
    }

    #[test]
    fn test_invalid_paths() {
        assert!(parse_path("$.a[").is_err());
        assert!(parse_path("$.a@bogus()").is_err());
    }
}
