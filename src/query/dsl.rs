//! The query tree and its Elasticsearch-style JSON form.
//!
//! Every query kind is one [`QueryNode`] variant. Parsing validates the whole
//! tree up front, so evaluation only ever sees well-formed nodes.
//!
//! # Examples
//!
//! ```
//! use quarry::query::QueryNode;
//! use serde_json::json;
//!
//! let query = QueryNode::from_json(&json!({
//!     "bool": {
//!         "must": [{"match": {"age": "40"}}],
//!         "must_not": [{"match": {"state": "ID"}}]
//!     }
//! })).unwrap();
//! assert!(matches!(query, QueryNode::Bool(_)));
//! ```

use serde_json::{Map, Value};

use crate::document::Source;
use crate::error::{QuarryError, Result};
use crate::geo::{GeoBoundingBox, GeoPoint, GeoShape, SpatialRelation, parse_distance};
use crate::query::query_string;
use crate::query::script::Script;

/// How the analyzed terms of a `match` combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Or,
    And,
}

/// A range bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound<T> {
    Included(T),
    Excluded(T),
    Unbounded,
}

impl<T> Bound<T> {
    pub fn map<U, F: FnOnce(&T) -> Option<U>>(&self, f: F) -> Option<Bound<U>> {
        match self {
            Bound::Included(v) => f(v).map(Bound::Included),
            Bound::Excluded(v) => f(v).map(Bound::Excluded),
            Bound::Unbounded => Some(Bound::Unbounded),
        }
    }

    pub fn try_map<U, F: FnOnce(&T) -> Result<U>>(&self, f: F) -> Result<Bound<U>> {
        match self {
            Bound::Included(v) => f(v).map(Bound::Included),
            Bound::Excluded(v) => f(v).map(Bound::Excluded),
            Bound::Unbounded => Ok(Bound::Unbounded),
        }
    }
}

impl<T: PartialOrd> Bound<T> {
    pub fn contains_lower(&self, value: &T) -> bool {
        match self {
            Bound::Included(bound) => value >= bound,
            Bound::Excluded(bound) => value > bound,
            Bound::Unbounded => true,
        }
    }

    pub fn contains_upper(&self, value: &T) -> bool {
        match self {
            Bound::Included(bound) => value <= bound,
            Bound::Excluded(bound) => value < bound,
            Bound::Unbounded => true,
        }
    }
}

/// `bool` query clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolQuery {
    pub must: Vec<QueryNode>,
    pub filter: Vec<QueryNode>,
    pub should: Vec<QueryNode>,
    pub must_not: Vec<QueryNode>,
    pub minimum_should_match: Option<MinimumShouldMatch>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: QueryNode) -> Self {
        self.must.push(query);
        self
    }

    pub fn filter(mut self, query: QueryNode) -> Self {
        self.filter.push(query);
        self
    }

    pub fn should(mut self, query: QueryNode) -> Self {
        self.should.push(query);
        self
    }

    pub fn must_not(mut self, query: QueryNode) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn minimum_should_match(mut self, value: MinimumShouldMatch) -> Self {
        self.minimum_should_match = Some(value);
        self
    }

    /// Clauses that restrict inclusion (`must` and `filter`).
    pub fn required(&self) -> impl Iterator<Item = &QueryNode> {
        self.must.iter().chain(self.filter.iter())
    }

    /// How many `should` clauses a document must match.
    pub fn required_should_matches(&self) -> usize {
        let clauses = self.should.len();
        match self.minimum_should_match {
            Some(msm) => msm.resolve(clauses),
            None if clauses > 0 && self.must.is_empty() && self.filter.is_empty() => 1,
            None => 0,
        }
    }
}

/// `minimum_should_match` as a count or a percentage; negative values count
/// clauses that may be missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MinimumShouldMatch {
    Count(i64),
    Percent(f64),
}

impl MinimumShouldMatch {
    pub fn resolve(&self, clauses: usize) -> usize {
        let clauses_i = clauses as i64;
        let required = match *self {
            MinimumShouldMatch::Count(n) if n < 0 => clauses_i + n,
            MinimumShouldMatch::Count(n) => n,
            MinimumShouldMatch::Percent(p) if p < 0.0 => {
                clauses_i - ((clauses as f64) * -p / 100.0).floor() as i64
            }
            MinimumShouldMatch::Percent(p) => ((clauses as f64) * p / 100.0).floor() as i64,
        };
        required.clamp(0, clauses_i) as usize
    }

    fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(MinimumShouldMatch::Count)
                .ok_or_else(|| invalid(format!("invalid minimum_should_match [{value}]"))),
            Value::String(s) => {
                let s = s.trim();
                if let Some(percent) = s.strip_suffix('%') {
                    percent
                        .parse::<f64>()
                        .map(MinimumShouldMatch::Percent)
                        .map_err(|_| invalid(format!("invalid minimum_should_match [{s}]")))
                } else {
                    s.parse::<i64>()
                        .map(MinimumShouldMatch::Count)
                        .map_err(|_| invalid(format!("invalid minimum_should_match [{s}]")))
                }
            }
            other => Err(invalid(format!("invalid minimum_should_match [{other}]"))),
        }
    }
}

/// `range` query.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub lower: Bound<Value>,
    pub upper: Bound<Value>,
}

impl RangeQuery {
    /// Closed range `[gte, lte]`.
    pub fn between<S: Into<String>>(field: S, gte: Value, lte: Value) -> Self {
        RangeQuery {
            field: field.into(),
            lower: Bound::Included(gte),
            upper: Bound::Included(lte),
        }
    }
}

/// Where a `geo_shape` query gets its shape from.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeSource {
    Inline(GeoShape),
    /// A shape stored in another document, resolved before evaluation.
    Indexed {
        index: Option<String>,
        id: String,
        path: String,
    },
}

/// The documents a `percolate` query matches stored queries against.
#[derive(Debug, Clone, PartialEq)]
pub enum PercolateSource {
    Documents(Vec<Source>),
    /// A stored document, resolved before evaluation.
    Stored { index: Option<String>, id: String },
}

/// One entry of a `more_like_this` `like` list.
#[derive(Debug, Clone, PartialEq)]
pub enum LikeItem {
    Text(String),
    /// A stored document, resolved to its texts before evaluation.
    Document { index: Option<String>, id: String },
    /// An artificial document given inline.
    Inline(Source),
}

/// `more_like_this` query.
#[derive(Debug, Clone, PartialEq)]
pub struct MoreLikeThisQuery {
    /// Fields to compare; empty means every text field.
    pub fields: Vec<String>,
    pub like: Vec<LikeItem>,
    pub min_term_freq: u32,
    pub min_doc_freq: u32,
    pub max_query_terms: usize,
    /// Whether documents named in `like` may match themselves.
    pub include: bool,
    /// `(index, id)` pairs excluded from the result.
    pub exclude: Vec<(String, String)>,
}

impl MoreLikeThisQuery {
    pub const DEFAULT_MIN_TERM_FREQ: u32 = 2;
    pub const DEFAULT_MIN_DOC_FREQ: u32 = 5;
    pub const DEFAULT_MAX_QUERY_TERMS: usize = 25;

    pub fn new(fields: Vec<String>, like: Vec<LikeItem>) -> Self {
        MoreLikeThisQuery {
            fields,
            like,
            min_term_freq: Self::DEFAULT_MIN_TERM_FREQ,
            min_doc_freq: Self::DEFAULT_MIN_DOC_FREQ,
            max_query_terms: Self::DEFAULT_MAX_QUERY_TERMS,
            include: false,
            exclude: Vec::new(),
        }
    }

    pub fn with_min_term_freq(mut self, min_term_freq: u32) -> Self {
        self.min_term_freq = min_term_freq;
        self
    }

    pub fn with_min_doc_freq(mut self, min_doc_freq: u32) -> Self {
        self.min_doc_freq = min_doc_freq;
        self
    }
}

/// A query tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    MatchAll,
    MatchNone,
    Match {
        field: String,
        query: Value,
        operator: Operator,
    },
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Ids(Vec<String>),
    Exists {
        field: String,
    },
    Bool(BoolQuery),
    Range(RangeQuery),
    GeoShape {
        field: String,
        shape: ShapeSource,
        relation: SpatialRelation,
    },
    GeoDistance {
        field: String,
        center: GeoPoint,
        /// Meters.
        distance: f64,
    },
    GeoBoundingBox {
        field: String,
        bbox: GeoBoundingBox,
    },
    Percolate {
        field: String,
        source: PercolateSource,
    },
    MoreLikeThis(MoreLikeThisQuery),
    Script(Script),
}

impl QueryNode {
    pub fn match_query<F: Into<String>, T: Into<Value>>(field: F, text: T) -> Self {
        QueryNode::Match {
            field: field.into(),
            query: text.into(),
            operator: Operator::Or,
        }
    }

    pub fn term<F: Into<String>, T: Into<Value>>(field: F, value: T) -> Self {
        QueryNode::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn range<F: Into<String>, T: Into<Value>>(field: F, gte: T, lte: T) -> Self {
        QueryNode::Range(RangeQuery::between(field, gte.into(), lte.into()))
    }

    /// Parse a query tree from its JSON form.
    pub fn from_json(value: &Value) -> Result<Self> {
        let (kind, body) = single_entry(value, "query")?;
        match kind.as_str() {
            "match_all" => Ok(QueryNode::MatchAll),
            "match_none" => Ok(QueryNode::MatchNone),
            "match" => parse_match(body),
            "term" => parse_term(body),
            "terms" => parse_terms(body),
            "ids" => parse_ids(body),
            "exists" => Ok(QueryNode::Exists {
                field: required_str(body, "field", "exists")?,
            }),
            "bool" => parse_bool(body),
            "constant_score" => {
                let filter = body
                    .get("filter")
                    .ok_or_else(|| invalid("[constant_score] requires a [filter]"))?;
                QueryNode::from_json(filter)
            }
            "range" => parse_range(body),
            "geo_shape" => parse_geo_shape(body),
            "geo_distance" => parse_geo_distance(body),
            "geo_bounding_box" => parse_geo_bounding_box(body),
            "percolate" => parse_percolate(body),
            "more_like_this" | "mlt" => parse_more_like_this(body),
            "script" => parse_script(body),
            "query_string" | "simple_query_string" => {
                let query = required_str(body, "query", kind.as_str())?;
                let default_field = body
                    .get("default_field")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                query_string::parse(&query, default_field.as_deref())
            }
            other => Err(invalid(format!("unknown query [{other}]"))),
        }
    }
}

fn invalid<S: Into<String>>(msg: S) -> QuarryError {
    QuarryError::invalid_query(msg)
}

/// The single `key: value` entry of an object such as `{"match": {...}}`.
fn single_entry<'a>(value: &'a Value, what: &str) -> Result<(String, &'a Value)> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid(format!("[{what}] must be an object, got {value}")))?;
    let mut entries = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "boost" | "_name" | "ignore_unmapped"));
    match (entries.next(), entries.next()) {
        (Some((key, body)), None) => Ok((key.clone(), body)),
        (None, _) => Err(invalid(format!("[{what}] is empty"))),
        (Some(_), Some(_)) => Err(invalid(format!(
            "[{what}] malformed, expected a single entry but found more"
        ))),
    }
}

fn required_str(body: &Value, key: &str, query: &str) -> Result<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("[{query}] requires a string [{key}]")))
}

fn ensure_scalar(value: &Value, query: &str) -> Result<()> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        other => Err(invalid(format!("[{query}] unsupported value {other}"))),
    }
}

/// Clauses given as a single object or an array of objects.
fn clauses(value: Option<&Value>) -> Result<Vec<QueryNode>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(QueryNode::from_json).collect(),
        Some(single) => Ok(vec![QueryNode::from_json(single)?]),
    }
}

fn parse_match(body: &Value) -> Result<QueryNode> {
    let (field, spec) = single_entry(body, "match")?;
    let (query, operator) = match spec {
        Value::Object(options) => {
            let query = options
                .get("query")
                .cloned()
                .ok_or_else(|| invalid("[match] requires [query]"))?;
            let operator = match options.get("operator").and_then(Value::as_str) {
                None => Operator::Or,
                Some(op) if op.eq_ignore_ascii_case("or") => Operator::Or,
                Some(op) if op.eq_ignore_ascii_case("and") => Operator::And,
                Some(op) => return Err(invalid(format!("[match] unknown operator [{op}]"))),
            };
            (query, operator)
        }
        scalar => (scalar.clone(), Operator::Or),
    };
    ensure_scalar(&query, "match")?;
    Ok(QueryNode::Match {
        field,
        query,
        operator,
    })
}

fn parse_term(body: &Value) -> Result<QueryNode> {
    let (field, spec) = single_entry(body, "term")?;
    let value = match spec {
        Value::Object(options) => options
            .get("value")
            .cloned()
            .ok_or_else(|| invalid("[term] requires [value]"))?,
        scalar => scalar.clone(),
    };
    ensure_scalar(&value, "term")?;
    Ok(QueryNode::Term { field, value })
}

fn parse_terms(body: &Value) -> Result<QueryNode> {
    let (field, spec) = single_entry(body, "terms")?;
    let values = spec
        .as_array()
        .ok_or_else(|| invalid("[terms] requires an array of values"))?;
    for value in values {
        ensure_scalar(value, "terms")?;
    }
    Ok(QueryNode::Terms {
        field,
        values: values.clone(),
    })
}

fn parse_ids(body: &Value) -> Result<QueryNode> {
    let values = body
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("[ids] requires an array [values]"))?;
    let ids = values
        .iter()
        .map(|v| match v {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(invalid(format!("[ids] unsupported id {other}"))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(QueryNode::Ids(ids))
}

fn parse_bool(body: &Value) -> Result<QueryNode> {
    let options = body
        .as_object()
        .ok_or_else(|| invalid("[bool] must be an object"))?;
    for key in options.keys() {
        if !matches!(
            key.as_str(),
            "must" | "filter" | "should" | "must_not" | "minimum_should_match" | "boost" | "_name"
        ) {
            return Err(invalid(format!("[bool] unknown field [{key}]")));
        }
    }
    let minimum_should_match = options
        .get("minimum_should_match")
        .map(MinimumShouldMatch::from_json)
        .transpose()?;

    Ok(QueryNode::Bool(BoolQuery {
        must: clauses(options.get("must"))?,
        filter: clauses(options.get("filter"))?,
        should: clauses(options.get("should"))?,
        must_not: clauses(options.get("must_not"))?,
        minimum_should_match,
    }))
}

fn parse_range(body: &Value) -> Result<QueryNode> {
    let (field, spec) = single_entry(body, "range")?;
    let options = spec
        .as_object()
        .ok_or_else(|| invalid("[range] field body must be an object"))?;

    let bound = |inclusive: &str, exclusive: &str| -> Result<Bound<Value>> {
        let pick = |key: &str| options.get(key).filter(|v| !v.is_null()).cloned();
        match (pick(inclusive), pick(exclusive)) {
            (Some(v), _) => {
                ensure_scalar(&v, "range")?;
                Ok(Bound::Included(v))
            }
            (None, Some(v)) => {
                ensure_scalar(&v, "range")?;
                Ok(Bound::Excluded(v))
            }
            (None, None) => Ok(Bound::Unbounded),
        }
    };

    let mut lower = bound("gte", "gt")?;
    let mut upper = bound("lte", "lt")?;
    // Legacy from/to form, inclusive unless told otherwise.
    if let Some(from) = options.get("from").filter(|v| !v.is_null()) {
        let inclusive = options
            .get("include_lower")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        lower = if inclusive {
            Bound::Included(from.clone())
        } else {
            Bound::Excluded(from.clone())
        };
    }
    if let Some(to) = options.get("to").filter(|v| !v.is_null()) {
        let inclusive = options
            .get("include_upper")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        upper = if inclusive {
            Bound::Included(to.clone())
        } else {
            Bound::Excluded(to.clone())
        };
    }

    Ok(QueryNode::Range(RangeQuery {
        field,
        lower,
        upper,
    }))
}

fn parse_relation(options: &Map<String, Value>) -> Result<SpatialRelation> {
    match options.get("relation").and_then(Value::as_str) {
        Some(relation) => relation.parse(),
        None => Ok(SpatialRelation::default()),
    }
}

fn parse_geo_shape(body: &Value) -> Result<QueryNode> {
    let (field, spec) = single_entry(body, "geo_shape")?;
    let options = spec
        .as_object()
        .ok_or_else(|| invalid("[geo_shape] field body must be an object"))?;
    let relation = parse_relation(options)?;

    let shape = if let Some(shape) = options.get("shape") {
        let shape = GeoShape::from_json(shape).map_err(|e| invalid(e.to_string()))?;
        ShapeSource::Inline(shape)
    } else if let Some(indexed) = options.get("indexed_shape") {
        ShapeSource::Indexed {
            index: indexed
                .get("index")
                .and_then(Value::as_str)
                .map(str::to_string),
            id: id_value(indexed.get("id"))
                .ok_or_else(|| invalid("[indexed_shape] requires [id]"))?,
            path: indexed
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or("shape")
                .to_string(),
        }
    } else {
        return Err(invalid("[geo_shape] requires either [shape] or [indexed_shape]"));
    };

    Ok(QueryNode::GeoShape {
        field,
        shape,
        relation,
    })
}

fn parse_geo_distance(body: &Value) -> Result<QueryNode> {
    let options = body
        .as_object()
        .ok_or_else(|| invalid("[geo_distance] must be an object"))?;
    let distance = options
        .get("distance")
        .ok_or_else(|| invalid("[geo_distance] requires [distance]"))?;
    let distance = parse_distance(distance)?;

    let mut points = options.iter().filter(|(key, _)| {
        !matches!(
            key.as_str(),
            "distance" | "distance_type" | "validation_method" | "boost" | "_name" | "ignore_unmapped"
        )
    });
    let (field, point) = match (points.next(), points.next()) {
        (Some(entry), None) => entry,
        _ => return Err(invalid("[geo_distance] requires exactly one field")),
    };
    let center = GeoPoint::from_json(point).map_err(|e| invalid(e.to_string()))?;

    Ok(QueryNode::GeoDistance {
        field: field.clone(),
        center,
        distance,
    })
}

fn parse_geo_bounding_box(body: &Value) -> Result<QueryNode> {
    let mut fields = body
        .as_object()
        .ok_or_else(|| invalid("[geo_bounding_box] must be an object"))?
        .iter()
        .filter(|(key, _)| {
            !matches!(
                key.as_str(),
                "type" | "validation_method" | "boost" | "_name" | "ignore_unmapped"
            )
        });
    let (field, spec) = match (fields.next(), fields.next()) {
        (Some(entry), None) => entry,
        _ => return Err(invalid("[geo_bounding_box] requires exactly one field")),
    };
    let bbox = GeoBoundingBox::from_json(spec)?;
    Ok(QueryNode::GeoBoundingBox {
        field: field.clone(),
        bbox,
    })
}

fn id_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn source_object(value: &Value, what: &str) -> Result<Source> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| invalid(format!("[{what}] must contain objects, got {value}")))
}

fn parse_percolate(body: &Value) -> Result<QueryNode> {
    let field = required_str(body, "field", "percolate")?;

    let source = if let Some(document) = body.get("document") {
        PercolateSource::Documents(vec![source_object(document, "document")?])
    } else if let Some(documents) = body.get("documents") {
        let documents = documents
            .as_array()
            .ok_or_else(|| invalid("[percolate] [documents] must be an array"))?;
        PercolateSource::Documents(
            documents
                .iter()
                .map(|doc| source_object(doc, "documents"))
                .collect::<Result<Vec<_>>>()?,
        )
    } else if let Some(id) = id_value(body.get("id")) {
        PercolateSource::Stored {
            index: body
                .get("index")
                .and_then(Value::as_str)
                .map(str::to_string),
            id,
        }
    } else {
        return Err(invalid(
            "[percolate] requires either [document], [documents] or [id]",
        ));
    };

    Ok(QueryNode::Percolate { field, source })
}

fn parse_like_item(value: &Value) -> Result<LikeItem> {
    match value {
        Value::String(text) => Ok(LikeItem::Text(text.clone())),
        Value::Object(item) => {
            if let Some(doc) = item.get("doc") {
                return Ok(LikeItem::Inline(source_object(doc, "like.doc")?));
            }
            let id = id_value(item.get("_id"))
                .ok_or_else(|| invalid("[more_like_this] like items require [_id] or [doc]"))?;
            Ok(LikeItem::Document {
                index: item
                    .get("_index")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                id,
            })
        }
        other => Err(invalid(format!("[more_like_this] unsupported like item {other}"))),
    }
}

fn parse_more_like_this(body: &Value) -> Result<QueryNode> {
    let options = body
        .as_object()
        .ok_or_else(|| invalid("[more_like_this] must be an object"))?;

    let fields = match options.get("fields") {
        None => Vec::new(),
        Some(Value::Array(fields)) => fields
            .iter()
            .map(|f| {
                f.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("[more_like_this] [fields] must be strings"))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => return Err(invalid(format!("[more_like_this] invalid fields {other}"))),
    };

    let like = match options.get("like").or_else(|| options.get("like_text")) {
        Some(Value::Array(items)) => items.iter().map(parse_like_item).collect::<Result<Vec<_>>>()?,
        Some(single) => vec![parse_like_item(single)?],
        None => return Err(invalid("[more_like_this] requires [like]")),
    };
    if like.is_empty() {
        return Err(invalid("[more_like_this] requires at least one [like] item"));
    }

    let mut query = MoreLikeThisQuery::new(fields, like);
    query.min_term_freq = mlt_count(options, "min_term_freq", MoreLikeThisQuery::DEFAULT_MIN_TERM_FREQ)?;
    query.min_doc_freq = mlt_count(options, "min_doc_freq", MoreLikeThisQuery::DEFAULT_MIN_DOC_FREQ)?;
    query.max_query_terms = mlt_count(options, "max_query_terms", MoreLikeThisQuery::DEFAULT_MAX_QUERY_TERMS)?;
    query.include = options
        .get("include")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(QueryNode::MoreLikeThis(query))
}

/// A non-negative integer option that must fit the target type.
fn mlt_count<T: TryFrom<u64>>(options: &Map<String, Value>, key: &str, default: T) -> Result<T> {
    let Some(value) = options.get(key) else {
        return Ok(default);
    };
    value
        .as_u64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| invalid(format!("[more_like_this] [{key}] must be a non-negative integer in range, got {value}")))
}

fn parse_script(body: &Value) -> Result<QueryNode> {
    let script = body
        .get("script")
        .ok_or_else(|| invalid("[script] requires a [script]"))?;
    Ok(QueryNode::Script(Script::from_json(script)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_match_forms() {
        let short = QueryNode::from_json(&json!({"match": {"title": "Thinking"}})).unwrap();
        assert_eq!(short, QueryNode::match_query("title", "Thinking"));

        let long = QueryNode::from_json(
            &json!({"match": {"title": {"query": "magic big", "operator": "AND"}}}),
        )
        .unwrap();
        assert_eq!(
            long,
            QueryNode::Match {
                field: "title".into(),
                query: json!("magic big"),
                operator: Operator::And,
            }
        );
    }

    #[test]
    fn test_parse_bool_single_and_array_clauses() {
        let query = QueryNode::from_json(&json!({
            "bool": {
                "must": {"match_all": {}},
                "filter": {"range": {"balance": {"gte": 20000, "lte": 30000}}},
                "should": [{"term": {"state.keyword": "ID"}}, {"term": {"state.keyword": "TX"}}],
                "minimum_should_match": "50%"
            }
        }))
        .unwrap();

        let QueryNode::Bool(bool_query) = query else {
            panic!("expected bool");
        };
        assert_eq!(bool_query.must, vec![QueryNode::MatchAll]);
        assert_eq!(
            bool_query.filter,
            vec![QueryNode::range("balance", 20000, 30000)]
        );
        assert_eq!(bool_query.should.len(), 2);
        assert_eq!(bool_query.required_should_matches(), 1);
    }

    #[test]
    fn test_minimum_should_match_resolution() {
        assert_eq!(MinimumShouldMatch::Count(2).resolve(3), 2);
        assert_eq!(MinimumShouldMatch::Count(5).resolve(3), 3);
        assert_eq!(MinimumShouldMatch::Count(-1).resolve(3), 2);
        assert_eq!(MinimumShouldMatch::Percent(30.0).resolve(4), 1);
        assert_eq!(MinimumShouldMatch::Percent(-25.0).resolve(4), 3);

        let only_should = BoolQuery::new().should(QueryNode::MatchAll);
        assert_eq!(only_should.required_should_matches(), 1);
        let with_must = BoolQuery::new()
            .must(QueryNode::MatchAll)
            .should(QueryNode::MatchNone);
        assert_eq!(with_must.required_should_matches(), 0);
    }

    #[test]
    fn test_parse_range_bounds() {
        let query =
            QueryNode::from_json(&json!({"range": {"age": {"gt": 30, "lte": "40"}}})).unwrap();
        let QueryNode::Range(range) = query else {
            panic!("expected range");
        };
        assert_eq!(range.lower, Bound::Excluded(json!(30)));
        assert_eq!(range.upper, Bound::Included(json!("40")));
        assert!(range.lower.map(|v| v.as_f64()).unwrap().contains_lower(&31.0));
    }

    #[test]
    fn test_parse_geo_shape() {
        let query = QueryNode::from_json(&json!({
            "geo_shape": {
                "location": {
                    "shape": {"type": "envelope", "coordinates": [[13.0, 53.0], [14.0, 52.0]]},
                    "relation": "within"
                }
            }
        }))
        .unwrap();
        let QueryNode::GeoShape { field, shape, relation } = query else {
            panic!("expected geo_shape");
        };
        assert_eq!(field, "location");
        assert_eq!(relation, SpatialRelation::Within);
        assert!(matches!(shape, ShapeSource::Inline(GeoShape::Envelope(_))));
    }

    #[test]
    fn test_parse_percolate_forms() {
        let by_id = QueryNode::from_json(&json!({
            "percolate": {"field": "query", "index": "library", "type": "book", "id": 1}
        }))
        .unwrap();
        assert_eq!(
            by_id,
            QueryNode::Percolate {
                field: "query".into(),
                source: PercolateSource::Stored {
                    index: Some("library".into()),
                    id: "1".into()
                }
            }
        );

        let inline = QueryNode::from_json(&json!({
            "percolate": {"field": "query", "documents": [{"title": "a"}, {"title": "b"}]}
        }))
        .unwrap();
        let QueryNode::Percolate { source: PercolateSource::Documents(docs), .. } = inline else {
            panic!("expected inline documents");
        };
        assert_eq!(docs.len(), 2);

        assert!(QueryNode::from_json(&json!({"percolate": {"field": "query"}})).is_err());
    }

    #[test]
    fn test_parse_more_like_this() {
        let query = QueryNode::from_json(&json!({
            "more_like_this": {
                "fields": ["description"],
                "like": ["Think Big", {"_index": "library", "_id": 2}],
                "min_term_freq": 1,
                "min_doc_freq": 1
            }
        }))
        .unwrap();
        let QueryNode::MoreLikeThis(mlt) = query else {
            panic!("expected more_like_this");
        };
        assert_eq!(mlt.fields, vec!["description"]);
        assert_eq!(mlt.min_term_freq, 1);
        assert_eq!(mlt.max_query_terms, 25);
        assert_eq!(
            mlt.like[1],
            LikeItem::Document {
                index: Some("library".into()),
                id: "2".into()
            }
        );
    }

    #[test]
    fn test_more_like_this_rejects_out_of_range_counts() {
        for (key, value) in [
            ("min_term_freq", json!(4_294_967_296u64)),
            ("min_doc_freq", json!(-1)),
            ("max_query_terms", json!(2.5)),
        ] {
            let body = json!({"more_like_this": {"fields": ["title"], "like": "Think", key: value}});
            assert!(
                matches!(QueryNode::from_json(&body), Err(QuarryError::InvalidQuery(_))),
                "{key} accepted {value}"
            );
        }

        let body = json!({"mlt": {"like": "Think", "min_term_freq": 4_294_967_295u64}});
        let Ok(QueryNode::MoreLikeThis(mlt)) = QueryNode::from_json(&body) else {
            panic!("expected more_like_this");
        };
        assert_eq!(mlt.min_term_freq, u32::MAX);
    }

    #[test]
    fn test_invalid_queries() {
        for bad in [
            json!({"nope": {}}),
            json!({"match": {"a": "x"}, "term": {"b": "y"}}),
            json!({}),
            json!("match_all"),
            json!({"match": {"title": {"query": ["array"]}}}),
            json!({"bool": {"must": [{"match": {}}]}}),
            json!({"bool": {"shoud": []}}),
            json!({"geo_shape": {"location": {"relation": "within"}}}),
        ] {
            let err = QueryNode::from_json(&bad).unwrap_err();
            assert!(matches!(err, QuarryError::InvalidQuery(_)), "{bad} gave {err:?}");
        }
    }

    #[test]
    fn test_constant_score_unwraps() {
        let query = QueryNode::from_json(
            &json!({"constant_score": {"filter": {"term": {"state.keyword": "ID"}}, "boost": 1.2}}),
        )
        .unwrap();
        assert_eq!(query, QueryNode::term("state.keyword", "ID"));
    }
}
