//! Search requests.

use serde_json::Value;

use crate::aggregation::{AggregationRequest, TermsAggregation};
use crate::error::{QuarryError, Result};
use crate::query::{QueryNode, query_string};
use crate::search::sort::SortField;

/// Request attributes accepted for compatibility but without effect.
const IGNORED_KEYS: &[&str] = &[
    "track_total_hits",
    "timeout",
    "explain",
    "version",
    "seq_no_primary_term",
    "min_score",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: QueryNode,
    pub from: usize,
    pub size: usize,
    pub sort: Vec<SortField>,
    pub aggs: Vec<(String, AggregationRequest)>,
    /// Whether hits carry their `_source`.
    pub source: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            query: QueryNode::MatchAll,
            from: 0,
            size: 10,
            sort: Vec::new(),
            aggs: Vec::new(),
            source: true,
        }
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: QueryNode) -> Self {
        self.query = query;
        self
    }

    /// Use a query-string query (the `q` URL parameter).
    pub fn with_q(mut self, q: &str) -> Result<Self> {
        self.query = query_string::parse(q, None)?;
        Ok(self)
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortField>) -> Self {
        self.sort = sort;
        self
    }

    /// Use the `sort` URL parameter form, e.g. `account_number:asc`.
    pub fn with_sort_param(mut self, sort: &str) -> Result<Self> {
        self.sort = SortField::parse_param(sort)?;
        Ok(self)
    }

    pub fn with_aggregation<S: Into<String>>(mut self, name: S, agg: AggregationRequest) -> Self {
        self.aggs.push((name.into(), agg));
        self
    }

    pub fn without_source(mut self) -> Self {
        self.source = false;
        self
    }

    /// Parse a search body. An empty body matches everything.
    pub fn from_json(body: &Value) -> Result<Self> {
        let size = SearchRequest::default().size;
        SearchRequest::from_json_with_defaults(body, size, TermsAggregation::DEFAULT_SIZE)
    }

    /// Parse a search body, using `size` and `terms_size` where the body
    /// leaves the page size or a terms aggregation's bucket count out.
    pub fn from_json_with_defaults(body: &Value, size: usize, terms_size: usize) -> Result<Self> {
        let mut request = SearchRequest::default().with_size(size);
        let object = match body {
            Value::Null => return Ok(request),
            Value::Object(object) => object,
            other => {
                return Err(QuarryError::invalid_request(format!(
                    "search body must be an object, got {other}"
                )));
            }
        };

        for (key, value) in object {
            match key.as_str() {
                "query" => request.query = QueryNode::from_json(value)?,
                "from" => request.from = non_negative(key, value)?,
                "size" => request.size = non_negative(key, value)?,
                "sort" => request.sort = SortField::parse_json(value)?,
                "aggs" | "aggregations" => {
                    request.aggs = AggregationRequest::parse_all_with_size(value, terms_size)?
                }
                "_source" => {
                    request.source = match value {
                        Value::Bool(include) => *include,
                        // Source filtering is not supported; any filter keeps the full source.
                        _ => true,
                    }
                }
                ignored if IGNORED_KEYS.contains(&ignored) => {
                    tracing::trace!("ignoring search attribute [{ignored}]");
                }
                unknown => {
                    return Err(QuarryError::invalid_request(format!(
                        "unknown key [{unknown}] in search request"
                    )));
                }
            }
        }
        Ok(request)
    }
}

fn non_negative(key: &str, value: &Value) -> Result<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| QuarryError::invalid_request(format!("[{key}] must be a non-negative integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::sort::SortOrder;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let request = SearchRequest::from_json(&json!({
            "query": {"match": {"address": "mill lane"}},
            "from": 10,
            "size": 5,
            "sort": [{"account_number": "asc"}],
            "aggs": {"by_state": {"terms": {"field": "state.keyword"}}},
            "track_total_hits": true
        }))
        .unwrap();

        assert_eq!(request.from, 10);
        assert_eq!(request.size, 5);
        assert_eq!(request.sort, vec![SortField::field("account_number", SortOrder::Asc)]);
        assert_eq!(request.aggs.len(), 1);
        assert!(matches!(request.query, QueryNode::Match { .. }));
    }

    #[test]
    fn test_defaults_and_errors() {
        let request = SearchRequest::from_json(&Value::Null).unwrap();
        assert_eq!(request, SearchRequest::default());
        assert_eq!(request.size, 10);
        let request = SearchRequest::from_json_with_defaults(&json!({}), 25, 3).unwrap();
        assert_eq!(request.size, 25);

        assert!(SearchRequest::from_json(&json!({"size": -1})).is_err());
        assert!(SearchRequest::from_json(&json!({"highlight": {}})).is_err());
        assert!(SearchRequest::from_json(&json!([1])).is_err());
    }

    #[test]
    fn test_q_and_sort_param() {
        let request = SearchRequest::new()
            .with_q("*")
            .unwrap()
            .with_sort_param("account_number:asc")
            .unwrap();
        assert_eq!(request.query, QueryNode::MatchAll);
        assert_eq!(request.sort.len(), 1);
        assert!(SearchRequest::new().with_q("(unclosed").is_err());
    }
}
