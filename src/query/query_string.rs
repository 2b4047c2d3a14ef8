//! Lucene-style query strings, as used by the `q` search parameter.
//!
//! Supported syntax:
//! - `*` or `*:*`: every document
//! - `term`, `"a phrase"`: match on the default field (all fields when unset)
//! - `field:term`, `field:"a phrase"`, `field:*`
//! - `field:[10 TO 20]`, `field:{10 TO 20}`, `*` as an open end
//! - `+required`, `-forbidden`, `NOT forbidden`
//! - `a AND b`, `a OR b`, parentheses
//!
//! Adjacent clauses without an operator are optional (`OR`).

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_till1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{all_consuming, map, opt, value, verify};
use nom::multi::many0;
use nom::sequence::{delimited, preceded, separated_pair, terminated};
use serde_json::Value;

use crate::error::{QuarryError, Result};
use crate::query::dsl::{BoolQuery, Bound, Operator, QueryNode, RangeQuery};

/// Field name standing for every searchable field.
pub const ALL_FIELDS: &str = "*";

/// Operators that are never read as search terms.
const KEYWORDS: [&str; 3] = ["AND", "OR", "NOT"];

/// Parse a query string into a query tree.
pub fn parse(query: &str, default_field: Option<&str>) -> Result<QueryNode> {
    let trimmed = query.trim();
    if trimmed.is_empty() || trimmed == "*" || trimmed == "*:*" {
        return Ok(QueryNode::MatchAll);
    }
    query_tree(trimmed, default_field.unwrap_or(ALL_FIELDS))
        .map(|(_, node)| node)
        .map_err(|e| QuarryError::invalid_query(format!("failed to parse query [{query}]: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occur {
    Should,
    Must,
    MustNot,
}

fn query_tree<'a>(input: &'a str, field: &str) -> IResult<&'a str, QueryNode> {
    all_consuming(terminated(|i: &'a str| or_expr(i, field), multispace0))(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    delimited(multispace0, tag(word), multispace1)
}

/// Clauses joined by `OR` or by plain adjacency.
fn or_expr<'a>(input: &'a str, field: &str) -> IResult<&'a str, QueryNode> {
    let (input, first) = and_group(input, field)?;
    let (input, rest) = many0(preceded(opt(keyword("OR")), |i: &'a str| and_group(i, field)))(input)?;

    let mut clauses = vec![first];
    clauses.extend(rest);
    if clauses.len() == 1 && clauses[0].0 == Occur::Should {
        return Ok((input, clauses.remove(0).1));
    }
    let mut bool_query = BoolQuery::new();
    for (occur, node) in clauses {
        bool_query = match occur {
            Occur::Should => bool_query.should(node),
            Occur::Must => bool_query.must(node),
            Occur::MustNot => bool_query.must_not(node),
        };
    }
    Ok((input, QueryNode::Bool(bool_query)))
}

/// Clauses joined by `AND`, which all become required.
fn and_group<'a>(input: &'a str, field: &str) -> IResult<&'a str, (Occur, QueryNode)> {
    let (input, first) = clause(input, field)?;
    let (input, rest) = many0(preceded(keyword("AND"), |i: &'a str| clause(i, field)))(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }

    let mut bool_query = BoolQuery::new();
    for (occur, node) in std::iter::once(first).chain(rest) {
        bool_query = match occur {
            Occur::MustNot => bool_query.must_not(node),
            Occur::Should | Occur::Must => bool_query.must(node),
        };
    }
    Ok((input, (Occur::Should, QueryNode::Bool(bool_query))))
}

fn clause<'a>(input: &'a str, field: &str) -> IResult<&'a str, (Occur, QueryNode)> {
    let occur = alt((
        value(Occur::Must, char('+')),
        value(Occur::MustNot, char('-')),
        value(Occur::MustNot, terminated(tag("NOT"), multispace1)),
    ));
    let (input, occur) = preceded(multispace0, opt(occur))(input)?;
    let (input, node) = preceded(multispace0, |i: &'a str| primary(i, field))(input)?;
    Ok((input, (occur.unwrap_or(Occur::Should), node)))
}

fn primary<'a>(input: &'a str, field: &str) -> IResult<&'a str, QueryNode> {
    alt((
        delimited(
            char('('),
            |i: &'a str| or_expr(i, field),
            preceded(multispace0, char(')')),
        ),
        map(phrase, |text| phrase_query(field, text)),
        fielded,
        map(verify(bare_word, |word: &str| !KEYWORDS.contains(&word)), |word| {
            if word == "*" {
                QueryNode::MatchAll
            } else {
                field_query(field, word)
            }
        }),
    ))(input)
}

/// `field:term`, `field:"a phrase"` or `field:[from TO to]`.
fn fielded(input: &str) -> IResult<&str, QueryNode> {
    let (input, name) = terminated(field_name, char(':'))(input)?;
    alt((
        map(phrase, |text| phrase_query(name, text)),
        map(range_bounds, |(lower, upper)| {
            QueryNode::Range(RangeQuery {
                field: name.to_string(),
                lower,
                upper,
            })
        }),
        map(field_value, |text| field_query(name, text)),
    ))(input)
}

fn range_bounds(input: &str) -> IResult<&str, (Bound<Value>, Bound<Value>)> {
    let (input, lower_inclusive) = alt((value(true, char('[')), value(false, char('{'))))(input)?;
    let (input, (from, to)) = delimited(
        multispace0,
        separated_pair(endpoint, delimited(multispace1, tag("TO"), multispace1), endpoint),
        multispace0,
    )(input)?;
    let (input, upper_inclusive) = alt((value(true, char(']')), value(false, char('}'))))(input)?;
    Ok((
        input,
        (bound(from, lower_inclusive), bound(to, upper_inclusive)),
    ))
}

fn bound(value: &str, inclusive: bool) -> Bound<Value> {
    match value {
        "*" => Bound::Unbounded,
        v if inclusive => Bound::Included(Value::String(v.to_string())),
        v => Bound::Excluded(Value::String(v.to_string())),
    }
}

fn endpoint(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace() || matches!(c, ']' | '}'))(input)
}

fn phrase(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_till(|c: char| c == '"'), char('"'))(input)
}

fn field_name(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == ':' || c.is_whitespace() || matches!(c, '(' | ')' | '"'))(input)
}

fn field_value(input: &str) -> IResult<&str, &str> {
    verify(
        take_till1(|c: char| c.is_whitespace() || matches!(c, '(' | ')')),
        |text: &str| !text.starts_with(['"', '[', '{']),
    )(input)
}

fn bare_word(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ':' | '"'))(input)
}

fn field_query(field: &str, value: &str) -> QueryNode {
    if value == "*" {
        if field == ALL_FIELDS {
            return QueryNode::MatchAll;
        }
        return QueryNode::Exists {
            field: field.to_string(),
        };
    }
    QueryNode::Match {
        field: field.to_string(),
        query: Value::String(value.to_string()),
        operator: Operator::Or,
    }
}

fn phrase_query(field: &str, phrase: &str) -> QueryNode {
    QueryNode::Match {
        field: field.to_string(),
        query: Value::String(phrase.to_string()),
        operator: Operator::And,
    }
}
