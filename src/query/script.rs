//! A small expression language for `script` queries.
//!
//! Supports the Painless subset people actually write in filter scripts:
//! `doc['field'].value`, `doc['field'].size()`, `doc['field'].empty`,
//! `params.name`, number/string/boolean literals, arithmetic, comparisons,
//! `&&`, `||`, `!` and parentheses. Scripts are parsed once when the query
//! is parsed and evaluated per document against doc values.

use std::cmp::Ordering;
use std::fmt;

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, multispace1};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use serde_json::{Map, Value};

use crate::document::FieldValue;
use crate::error::{QuarryError, Result};

/// Languages accepted in the `lang` attribute.
const SUPPORTED_LANGS: [&str; 2] = ["painless", "expression"];

/// A value produced while evaluating a script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl ScriptValue {
    fn from_field(value: &FieldValue) -> Result<Self> {
        match value {
            FieldValue::Integer(i) => Ok(ScriptValue::Int(*i)),
            FieldValue::Float(f) => Ok(ScriptValue::Float(*f)),
            FieldValue::Text(s) => Ok(ScriptValue::Str(s.clone())),
            FieldValue::Boolean(b) => Ok(ScriptValue::Bool(*b)),
            other => Err(QuarryError::evaluation(format!(
                "cannot access values of type [{}] from a script",
                other.type_name()
            ))),
        }
    }

    fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(ScriptValue::Null),
            Value::Bool(b) => Ok(ScriptValue::Bool(*b)),
            Value::Number(n) => Ok(n
                .as_i64()
                .map(ScriptValue::Int)
                .unwrap_or_else(|| ScriptValue::Float(n.as_f64().unwrap_or(f64::NAN)))),
            Value::String(s) => Ok(ScriptValue::Str(s.clone())),
            other => Err(QuarryError::evaluation(format!(
                "unsupported script parameter {other}"
            ))),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Int(i) => Some(*i as f64),
            ScriptValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Int(_) => "int",
            ScriptValue::Float(_) => "double",
            ScriptValue::Str(_) => "String",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Null => "null",
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Int(i) => write!(f, "{i}"),
            ScriptValue::Float(v) => write!(f, "{v}"),
            ScriptValue::Str(s) => f.write_str(s),
            ScriptValue::Bool(b) => write!(f, "{b}"),
            ScriptValue::Null => f.write_str("null"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocAccess {
    Value,
    Size,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Parsed script expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(ScriptValue),
    Doc { field: String, access: DocAccess },
    Param(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Fields read through `doc[...]`.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Doc { field, .. } => out.push(field),
            Expr::Unary(_, inner) => inner.collect_fields(out),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
            Expr::Literal(_) | Expr::Param(_) => {}
        }
    }
}

/// Per-document field access during evaluation.
pub trait ScriptContext {
    /// The doc values of `field` for the current document.
    fn doc_values(&self, field: &str) -> Result<&[FieldValue]>;
}

/// A compiled `script` query.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub source: String,
    pub lang: String,
    pub params: Map<String, Value>,
    pub expr: Expr,
}

impl Script {
    /// Compile a script source with the default language.
    pub fn new<S: Into<String>>(source: S) -> Result<Self> {
        let source = source.into();
        let expr = parse_expression(&source)?;
        Ok(Script {
            source,
            lang: "painless".to_string(),
            params: Map::new(),
            expr,
        })
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Parse the `script` attribute: either a bare source string or an
    /// object with `source` (or `inline`), `lang` and `params`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let (source, lang, params) = match value {
            Value::String(source) => (source.clone(), None, Map::new()),
            Value::Object(options) => {
                let source = options
                    .get("source")
                    .or_else(|| options.get("inline"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| QuarryError::invalid_query("[script] requires [source]"))?;
                let lang = options.get("lang").and_then(Value::as_str);
                let params = match options.get("params") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(params)) => params.clone(),
                    Some(other) => {
                        return Err(QuarryError::invalid_query(format!(
                            "[script] params must be an object, got {other}"
                        )));
                    }
                };
                (source.to_string(), lang, params)
            }
            other => {
                return Err(QuarryError::invalid_query(format!(
                    "[script] unsupported script {other}"
                )));
            }
        };

        let lang = lang.unwrap_or("painless");
        if !SUPPORTED_LANGS.contains(&lang) {
            return Err(QuarryError::invalid_query(format!(
                "script_lang not supported [{lang}]"
            )));
        }
        Ok(Script::new(source)?.with_params(params).with_lang(lang))
    }

    fn with_lang(mut self, lang: &str) -> Self {
        self.lang = lang.to_string();
        self
    }

    /// Evaluate against one document; the script must produce a boolean.
    pub fn matches(&self, ctx: &dyn ScriptContext) -> Result<bool> {
        match self.eval(&self.expr, ctx)? {
            ScriptValue::Bool(b) => Ok(b),
            other => Err(QuarryError::evaluation(format!(
                "cannot cast [{}] to boolean in script [{}]",
                other.type_name(),
                self.source
            ))),
        }
    }

    fn eval(&self, expr: &Expr, ctx: &dyn ScriptContext) -> Result<ScriptValue> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Param(name) => match self.params.get(name) {
                Some(v) => ScriptValue::from_json(v),
                None => Ok(ScriptValue::Null),
            },
            Expr::Doc { field, access } => {
                let values = ctx.doc_values(field)?;
                match access {
                    DocAccess::Size => Ok(ScriptValue::Int(values.len() as i64)),
                    DocAccess::Empty => Ok(ScriptValue::Bool(values.is_empty())),
                    DocAccess::Value => match values.first() {
                        Some(v) => ScriptValue::from_field(v),
                        None => Err(QuarryError::evaluation(format!(
                            "A document doesn't have a value for field [{field}]"
                        ))),
                    },
                }
            }
            Expr::Unary(op, inner) => {
                let v = self.eval(inner, ctx)?;
                match (op, v) {
                    (UnaryOp::Not, ScriptValue::Bool(b)) => Ok(ScriptValue::Bool(!b)),
                    (UnaryOp::Neg, ScriptValue::Int(i)) => Ok(ScriptValue::Int(-i)),
                    (UnaryOp::Neg, ScriptValue::Float(f)) => Ok(ScriptValue::Float(-f)),
                    (op, v) => Err(type_error(&format!("{op:?}"), &v, &v)),
                }
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                Ok(ScriptValue::Bool(self.eval_bool(lhs, ctx)? && self.eval_bool(rhs, ctx)?))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                Ok(ScriptValue::Bool(self.eval_bool(lhs, ctx)? || self.eval_bool(rhs, ctx)?))
            }
            Expr::Binary(op, lhs, rhs) => {
                let (a, b) = (self.eval(lhs, ctx)?, self.eval(rhs, ctx)?);
                binary(*op, a, b)
            }
        }
    }

    fn eval_bool(&self, expr: &Expr, ctx: &dyn ScriptContext) -> Result<bool> {
        match self.eval(expr, ctx)? {
            ScriptValue::Bool(b) => Ok(b),
            other => Err(QuarryError::evaluation(format!(
                "cannot cast [{}] to boolean",
                other.type_name()
            ))),
        }
    }
}

fn type_error(op: &str, a: &ScriptValue, b: &ScriptValue) -> QuarryError {
    QuarryError::evaluation(format!(
        "cannot apply [{op}] to types [{}] and [{}]",
        a.type_name(),
        b.type_name()
    ))
}

fn binary(op: BinaryOp, a: ScriptValue, b: ScriptValue) -> Result<ScriptValue> {
    use ScriptValue::*;

    match op {
        BinaryOp::Eq => return Ok(Bool(equals(&a, &b))),
        BinaryOp::Ne => return Ok(Bool(!equals(&a, &b))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&a, &b).ok_or_else(|| type_error("compare", &a, &b))?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Bool(result));
        }
        _ => {}
    }

    match (op, &a, &b) {
        (BinaryOp::Add, Str(x), y) => Ok(Str(format!("{x}{y}"))),
        (BinaryOp::Add, x, Str(y)) => Ok(Str(format!("{x}{y}"))),
        (_, Int(x), Int(y)) => {
            let (x, y) = (*x, *y);
            let result = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Div | BinaryOp::Rem if y == 0 => {
                    return Err(QuarryError::evaluation("/ by zero"));
                }
                BinaryOp::Div => x.checked_div(y),
                _ => x.checked_rem(y),
            };
            result
                .map(Int)
                .ok_or_else(|| QuarryError::evaluation("integer overflow"))
        }
        _ => {
            let (x, y) = match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x, y),
                _ => return Err(type_error(&format!("{op:?}"), &a, &b)),
            };
            Ok(Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                _ => x % y,
            }))
        }
    }
}

fn equals(a: &ScriptValue, b: &ScriptValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &ScriptValue, b: &ScriptValue) -> Option<Ordering> {
    match (a, b) {
        (ScriptValue::Int(x), ScriptValue::Int(y)) => Some(x.cmp(y)),
        (ScriptValue::Str(x), ScriptValue::Str(y)) => Some(x.cmp(y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

// ---- parser ----

/// Parse a script source into an expression tree.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let mut script = all_consuming(delimited(
        pair(multispace0, opt(terminated(tag("return"), multispace1))),
        expression,
        pair(ws(opt(char(';'))), multispace0),
    ));
    script(source)
        .map(|(_, expr)| expr)
        .map_err(|e| QuarryError::invalid_query(format!("compile error in script [{source}]: {e}")))
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn fold(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    })
}

fn expression(input: &str) -> IResult<&str, Expr> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(pair(value(BinaryOp::Or, ws(tag("||"))), and_expr))(input)?;
    Ok((input, fold(first, rest)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = comparison(input)?;
    let (input, rest) = many0(pair(value(BinaryOp::And, ws(tag("&&"))), comparison))(input)?;
    Ok((input, fold(first, rest)))
}

fn comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    ws(alt((
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Gt, tag(">")),
        value(BinaryOp::Lt, tag("<")),
    )))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = additive(input)?;
    let (input, rhs) = opt(pair(comparison_op, additive))(input)?;
    Ok((input, fold(lhs, rhs.into_iter().collect())))
}

fn additive(input: &str) -> IResult<&str, Expr> {
    let (input, first) = multiplicative(input)?;
    let op = ws(alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, char('-')),
    )));
    let (input, rest) = many0(pair(op, multiplicative))(input)?;
    Ok((input, fold(first, rest)))
}

fn multiplicative(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let op = ws(alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
        value(BinaryOp::Rem, char('%')),
    )));
    let (input, rest) = many0(pair(op, unary))(input)?;
    Ok((input, fold(first, rest)))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('!')), unary), |e| {
            Expr::Unary(UnaryOp::Not, Box::new(e))
        }),
        map(preceded(ws(char('-')), unary), |e| {
            Expr::Unary(UnaryOp::Neg, Box::new(e))
        }),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), expression, ws(char(')'))),
        doc_access,
        param,
        map(number, Expr::Literal),
        map(string_literal, |s| Expr::Literal(ScriptValue::Str(s.to_string()))),
        map(keyword_literal, Expr::Literal),
    )))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))(input)
}

fn number(input: &str) -> IResult<&str, ScriptValue> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |digits: &str| {
            if digits.contains('.') {
                digits.parse::<f64>().map(ScriptValue::Float).map_err(|e| e.to_string())
            } else {
                digits.parse::<i64>().map(ScriptValue::Int).map_err(|e| e.to_string())
            }
        },
    )(input)
}

fn keyword_literal(input: &str) -> IResult<&str, ScriptValue> {
    map_res(identifier, |word| match word {
        "true" => Ok(ScriptValue::Bool(true)),
        "false" => Ok(ScriptValue::Bool(false)),
        "null" => Ok(ScriptValue::Null),
        other => Err(format!("unknown identifier [{other}]")),
    })(input)
}

fn doc_access(input: &str) -> IResult<&str, Expr> {
    let field = delimited(
        pair(tag("doc"), ws(char('['))),
        string_literal,
        ws(char(']')),
    );
    let access = preceded(
        ws(char('.')),
        alt((
            value(DocAccess::Value, tag("value")),
            value(
                DocAccess::Size,
                tuple((alt((tag("size"), tag("length"))), ws(char('(')), char(')'))),
            ),
            value(DocAccess::Empty, tag("empty")),
            value(DocAccess::Empty, tuple((tag("isEmpty"), ws(char('(')), char(')')))),
        )),
    );
    map(pair(field, access), |(field, access)| Expr::Doc {
        field: field.to_string(),
        access,
    })(input)
}

fn param(input: &str) -> IResult<&str, Expr> {
    let dotted = preceded(pair(tag("params"), char('.')), identifier);
    let indexed = preceded(
        pair(tag("params"), ws(char('['))),
        terminated(string_literal, ws(char(']'))),
    );
    map(alt((dotted, indexed)), |name: &str| Expr::Param(name.to_string()))(input)
}
