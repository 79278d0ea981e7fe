//! A `nom`-based parser for the XPath expression language.

use super::ast::*;
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0},
    combinator::{map, map_res, not, opt, peek, recognize},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};

// --- Main Public Parser ---

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(XPathError::XPathParse(
            input.to_string(),
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(XPathError::XPathParse(input.to_string(), e.to_string())),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// An operator name such as `and` or `div` that must not run into a following name.
fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = NomError<&'a str>> {
    terminated(tag(word), not(peek(take_while1(is_name_char))))
}

fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Expression>,
    operator: fn(&'a str) -> IResult<&'a str, BinaryOperator>,
) -> IResult<&'a str, Expression> {
    let (input, first) = operand(input)?;
    let (input, rest) = many0(pair(ws(operator), operand)).parse(input)?;
    let expr = rest.into_iter().fold(first, |left, (op, right)| Expression::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    });
    Ok((input, expr))
}

// --- Expression Parsers (in order of precedence) ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("or"), |_| BinaryOperator::Or).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("and"), |_| BinaryOperator::And).parse(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("="), |_| BinaryOperator::Equals),
        map(tag("!="), |_| BinaryOperator::NotEquals),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("<="), |_| BinaryOperator::LessThanOrEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('+'), |_| BinaryOperator::Plus),
        map(char('-'), |_| BinaryOperator::Minus),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('*'), |_| BinaryOperator::Multiply),
        map(keyword("div"), |_| BinaryOperator::Divide),
        map(keyword("mod"), |_| BinaryOperator::Modulo),
    ))
    .parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(char('|'), |_| BinaryOperator::Union).parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, and_expr, or_op)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, equality_expr, and_op)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, relational_expr, equality_op)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, additive_expr, relational_op)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, multiplicative_expr, additive_op)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, unary_expr, multiplicative_op)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    let (i, neg) = opt(ws(char('-'))).parse(input)?;
    let (i, expr) = union_expr(i)?;
    match neg {
        Some(_) => Ok((
            i,
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            },
        )),
        None => Ok((i, expr)),
    }
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    left_assoc(input, path_expr, union_op)
}

/// A primary expression optionally continued by `/step` or `//step`, or a plain location path.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    // Primary expressions go first so `position()` is not read as a step named `position`.
    let (i, start) =
        ws(alt((filter_expr, map(location_path, Expression::LocationPath)))).parse(input)?;
    let (i, more) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    let (i, _) = multispace0(i)?;
    if more.is_empty() {
        return Ok((i, start));
    }

    let (start_point, is_absolute, mut steps) = match start {
        Expression::LocationPath(lp) => (lp.start_point, lp.is_absolute, lp.steps),
        other => (Some(Box::new(other)), false, vec![]),
    };
    push_steps(&mut steps, more);
    Ok((
        i,
        Expression::LocationPath(LocationPath {
            start_point,
            is_absolute,
            steps,
        }),
    ))
}

fn push_steps(steps: &mut Vec<Step>, more: Vec<(&str, Step)>) {
    for (sep, next) in more {
        if sep == "//" {
            steps.push(Step::descendant_or_self());
        }
        steps.push(next);
    }
}

fn filter_expr(input: &str) -> IResult<&str, Expression> {
    let (i, expr) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    if predicates.is_empty() {
        return Ok((i, expr));
    }
    Ok((
        i,
        Expression::Filter {
            expr: Box::new(expr),
            predicates,
        },
    ))
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    alt((
        variable_reference,
        map(number, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    ))
    .parse(input)
}

// --- Literals ---

/// `12`, `12.5`, `.5`. No sign, exponent or `NaN`/`Infinity` spellings.
fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        ))),
        str::parse::<f64>,
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), q_name), Expression::Variable).parse(input)
}

// --- Names and Node Tests ---

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_name_char),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(recognize(pair(nc_name, opt(pair(char(':'), nc_name)))), |s: &str| {
        s.to_string()
    })
    .parse(input)
}

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(terminated(tag("text"), empty_parens), |_| NodeTest::NodeType(NodeTypeTest::Text)),
        map(terminated(tag("node"), empty_parens), |_| NodeTest::NodeType(NodeTypeTest::Node)),
        map(terminated(tag("comment"), empty_parens), |_| {
            NodeTest::NodeType(NodeTypeTest::Comment)
        }),
        map(
            preceded(
                tag("processing-instruction"),
                delimited(ws(char('(')), opt(ws(string_literal)), char(')')),
            ),
            |target| NodeTest::NodeType(NodeTypeTest::ProcessingInstruction(target)),
        ),
    ))
    .parse(input)
}

fn empty_parens(input: &str) -> IResult<&str, ()> {
    map(pair(ws(char('(')), char(')')), |_| ()).parse(input)
}

pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(char('*'), |_| NodeTest::Wildcard),
        node_type_test,
        map(terminated(nc_name, tag(":*")), |p: &str| NodeTest::PrefixWildcard(p.to_string())),
        map(q_name, NodeTest::Name),
    ))
    .parse(input)
}

// --- Paths ---

fn axis(input: &str) -> IResult<&str, Axis> {
    terminated(
        alt((
            map(tag("child"), |_| Axis::Child),
            map(tag("descendant-or-self"), |_| Axis::DescendantOrSelf),
            map(tag("descendant"), |_| Axis::Descendant),
            map(tag("attribute"), |_| Axis::Attribute),
            map(tag("parent"), |_| Axis::Parent),
            map(tag("ancestor-or-self"), |_| Axis::AncestorOrSelf),
            map(tag("ancestor"), |_| Axis::Ancestor),
            map(tag("self"), |_| Axis::SelfAxis),
            map(tag("following-sibling"), |_| Axis::FollowingSibling),
            map(tag("preceding-sibling"), |_| Axis::PrecedingSibling),
            map(tag("following"), |_| Axis::Following),
            map(tag("preceding"), |_| Axis::Preceding),
        )),
        tag("::"),
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let node = || NodeTest::NodeType(NodeTypeTest::Node);
    let (i, (axis, node_test)) = alt((
        map(tag(".."), |_| (Axis::Parent, node())),
        map(char('.'), |_| (Axis::SelfAxis, node())),
        map(preceded(char('@'), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| (ax.unwrap_or(Axis::Child), nt)),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            axis,
            node_test,
            predicates,
        },
    ))
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let double_slash = tag::<_, _, NomError<&str>>("//").parse(input);
    let (i, (is_absolute, mut steps)) = if let Ok((rem, _)) = double_slash {
        let (rem, first) = step(rem)?;
        (rem, (true, vec![Step::descendant_or_self(), first]))
    } else if let Ok((rem, _)) = char::<_, NomError<&str>>('/').parse(input) {
        match step(rem) {
            Ok((rem, first)) => (rem, (true, vec![first])),
            // A bare "/" selects the root.
            Err(_) => (rem, (true, vec![])),
        }
    } else {
        let (rem, first) = step(input)?;
        (rem, (false, vec![first]))
    };

    let (i, more) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    push_steps(&mut steps, more);
    Ok((
        i,
        LocationPath {
            start_point: None,
            is_absolute,
            steps,
        },
    ))
}

// --- Function Calls ---

fn function_call(input: &str) -> IResult<&str, Expression> {
    // A name followed by '(' so that `foo` in `foo/bar` stays a step.
    let (i, name) = q_name(input)?;
    let (i, _) = peek(ws(char('('))).parse(i)?;
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Verify)));
    }
    let (i, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )
    .parse(i)?;
    Ok((i, Expression::FunctionCall { name, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(expr: &str) -> LocationPath {
        match parse_expression(expr).unwrap() {
            Expression::LocationPath(lp) => lp,
            other => panic!("Expected a location path, got {:?}", other),
        }
    }

    #[test]
    fn test_abbreviated_steps() {
        let lp = path("//item[@id='a']/..");
        assert!(lp.is_absolute);
        assert_eq!(lp.steps.len(), 3);
        assert_eq!(lp.steps[0].axis, Axis::DescendantOrSelf);
        assert_eq!(lp.steps[1].node_test, NodeTest::Name("item".to_string()));
        assert_eq!(lp.steps[1].predicates.len(), 1);
        assert_eq!(lp.steps[2].axis, Axis::Parent);

        let dot = path(".");
        assert_eq!(dot.steps[0].axis, Axis::SelfAxis);
    }

    #[test]
    fn test_explicit_axes_and_node_types() {
        let lp = path("ancestor-or-self::section/following-sibling::*/text()");
        assert_eq!(lp.steps[0].axis, Axis::AncestorOrSelf);
        assert_eq!(lp.steps[1].axis, Axis::FollowingSibling);
        assert_eq!(lp.steps[1].node_test, NodeTest::Wildcard);
        assert_eq!(lp.steps[2].node_test, NodeTest::NodeType(NodeTypeTest::Text));
        let pi = path("processing-instruction('xml-stylesheet')");
        assert_eq!(
            pi.steps[0].node_test,
            NodeTest::NodeType(NodeTypeTest::ProcessingInstruction(Some("xml-stylesheet".into())))
        );
    }

    #[test]
    fn test_operator_keywords_need_boundaries() {
        // `order` and `android` are element names, not `or`/`and` operators.
        let expr = parse_expression("order and android").unwrap();
        match expr {
            Expression::BinaryOp { op, left, right } => {
                assert_eq!(op, BinaryOperator::And);
                assert!(left.is_location_path());
                assert!(right.is_location_path());
            }
            other => panic!("Expected an And, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3 = 7 or false()").unwrap();
        match expr {
            Expression::BinaryOp { op: BinaryOperator::Or, left, .. } => match *left {
                Expression::BinaryOp { op: BinaryOperator::Equals, .. } => {}
                other => panic!("Expected Equals under Or, got {:?}", other),
            },
            other => panic!("Expected Or at the top, got {:?}", other),
        }
    }

    #[test]
    fn test_function_calls_and_variables() {
        let expr = parse_expression("concat($a, string(@id), 'x')").unwrap();
        match expr {
            Expression::FunctionCall { name, args } => {
                assert_eq!(name, "concat");
                assert_eq!(args.len(), 3);
                assert_eq!(args[0], Expression::Variable("a".into()));
            }
            other => panic!("Expected a function call, got {:?}", other),
        }
        let lp = path("$items/item");
        assert!(lp.start_point.is_some());
    }

    #[test]
    fn test_numbers_reject_special_spellings() {
        assert_eq!(parse_expression(".5").unwrap(), Expression::Number(0.5));
        assert_eq!(parse_expression("10").unwrap(), Expression::Number(10.0));
        // These are element names.
        assert!(parse_expression("inf").unwrap().is_location_path());
        assert!(parse_expression("nan").unwrap().is_location_path());
    }

    #[test]
    fn test_union_and_match_pattern_rewrite() {
        let expr = parse_expression("item | /catalog").unwrap();
        let pattern = expr.to_match_pattern();
        match pattern {
            Expression::BinaryOp { left, right, .. } => {
                match *left {
                    Expression::LocationPath(lp) => {
                        assert!(lp.is_absolute);
                        assert_eq!(lp.steps[0].axis, Axis::DescendantOrSelf);
                    }
                    other => panic!("Expected a path, got {:?}", other),
                }
                match *right {
                    Expression::LocationPath(lp) => assert_eq!(lp.steps.len(), 1),
                    other => panic!("Expected a path, got {:?}", other),
                }
            }
            other => panic!("Expected a union, got {:?}", other),
        }
        assert!(parse_expression("/").unwrap().is_root_path());
    }

    #[test]
    fn test_filter_expression_and_prefix_wildcard() {
        match parse_expression("(//item)[2]").unwrap() {
            Expression::Filter { predicates, .. } => assert_eq!(predicates.len(), 1),
            other => panic!("Expected a filter expression, got {:?}", other),
        }
        let lp = path("svg:*");
        assert_eq!(lp.steps[0].node_test, NodeTest::PrefixWildcard("svg".into()));
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(parse_expression("item[").is_err());
        assert!(parse_expression("1 +").is_err());
    }
}
