//! Typed field values produced by document parsing.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::geo::GeoShape;
use crate::query::QueryNode;

/// A single value of a mapped field, after coercion to the field's type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Geo(GeoShape),
    /// A parsed percolator query.
    Query(Arc<QueryNode>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_geo(&self) -> Option<&GeoShape> {
        match self {
            FieldValue::Geo(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn as_query(&self) -> Option<&Arc<QueryNode>> {
        match self {
            FieldValue::Query(query) => Some(query),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldValue::Integer(_) | FieldValue::Float(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "string",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Geo(_) => "geo",
            FieldValue::Query(_) => "query",
        }
    }

    /// Total order used by sorting and ranges: numbers compare numerically
    /// across integer and float, booleans sort `false` first, strings
    /// compare bytewise. Values of different kinds order by kind.
    pub fn total_cmp(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                a.total_cmp(&b)
            }
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.cmp(b),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            FieldValue::Integer(_) | FieldValue::Float(_) => 0,
            FieldValue::Boolean(_) => 1,
            FieldValue::Text(_) => 2,
            FieldValue::Geo(_) => 3,
            FieldValue::Query(_) => 4,
        }
    }

    /// JSON form used for sort values and aggregation keys.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => json!(s),
            FieldValue::Integer(i) => json!(i),
            FieldValue::Float(f) => json!(f),
            FieldValue::Boolean(b) => json!(b),
            FieldValue::Geo(shape) => serde_json::to_value(shape).unwrap_or(Value::Null),
            FieldValue::Query(_) => Value::Null,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::Geo(shape) => write!(f, "{shape:?}"),
            FieldValue::Query(_) => f.write_str("<query>"),
        }
    }
}
