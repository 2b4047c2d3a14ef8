//! Search responses.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::aggregation::AggregationResult;
use crate::aggregation::result::find;
use crate::document::Source;

/// Score reported for every unsorted hit. Matches are unranked.
pub const CONSTANT_SCORE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub index: String,
    pub id: String,
    pub version: u64,
    pub seq_no: u64,
    pub source: Option<Arc<Source>>,
    /// Sort values, present when the request sorted.
    pub sort: Vec<Value>,
    /// Slots of the percolated documents this stored query matched.
    pub percolator_slots: Option<Vec<usize>>,
}

impl SearchHit {
    pub fn to_json(&self) -> Value {
        let mut hit = Map::new();
        hit.insert("_index".into(), json!(self.index));
        hit.insert("_id".into(), json!(self.id));
        hit.insert("_version".into(), json!(self.version));
        hit.insert("_seq_no".into(), json!(self.seq_no));
        let score = if self.sort.is_empty() {
            json!(CONSTANT_SCORE)
        } else {
            Value::Null
        };
        hit.insert("_score".into(), score);
        if let Some(source) = &self.source {
            hit.insert("_source".into(), Value::Object(source.as_ref().clone()));
        }
        if !self.sort.is_empty() {
            hit.insert("sort".into(), Value::Array(self.sort.clone()));
        }
        if let Some(slots) = &self.percolator_slots {
            hit.insert(
                "fields".into(),
                json!({ "_percolator_document_slot": slots }),
            );
        }
        Value::Object(hit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub took: Duration,
    /// Number of matching documents, independent of paging.
    pub total: usize,
    pub hits: Vec<SearchHit>,
    pub aggregations: Vec<(String, AggregationResult)>,
}

impl SearchResponse {
    pub fn aggregation(&self, name: &str) -> Option<&AggregationResult> {
        find(&self.aggregations, name)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.id.as_str()).collect()
    }

    pub fn to_json(&self) -> Value {
        let sorted = self.hits.iter().any(|hit| !hit.sort.is_empty());
        let max_score = if self.hits.is_empty() || sorted {
            Value::Null
        } else {
            json!(CONSTANT_SCORE)
        };
        let mut body = json!({
            "took": self.took.as_millis() as u64,
            "timed_out": false,
            "_shards": {"total": 1, "successful": 1, "skipped": 0, "failed": 0},
            "hits": {
                "total": {"value": self.total, "relation": "eq"},
                "max_score": max_score,
                "hits": self.hits.iter().map(SearchHit::to_json).collect::<Vec<_>>(),
            }
        });
        if !self.aggregations.is_empty() {
            let aggregations: Map<String, Value> = self
                .aggregations
                .iter()
                .map(|(name, result)| (name.clone(), result.to_json()))
                .collect();
            body["aggregations"] = Value::Object(aggregations);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str) -> SearchHit {
        SearchHit {
            index: "library".into(),
            id: id.into(),
            version: 1,
            seq_no: 0,
            source: Some(Arc::new(json!({"title": "Think Big"}).as_object().cloned().unwrap())),
            sort: Vec::new(),
            percolator_slots: None,
        }
    }

    #[test]
    fn test_response_json() {
        let mut percolated = hit("thinking-books");
        percolated.percolator_slots = Some(vec![1]);
        let response = SearchResponse {
            took: Duration::from_millis(3),
            total: 7,
            hits: vec![hit("1"), percolated],
            aggregations: vec![("max_price".into(), AggregationResult::Metric(Some(30.0)))],
        };
        let body = response.to_json();

        assert_eq!(body["hits"]["total"], json!({"value": 7, "relation": "eq"}));
        assert_eq!(body["hits"]["max_score"], json!(1.0));
        assert_eq!(body["hits"]["hits"][0]["_source"]["title"], json!("Think Big"));
        assert_eq!(
            body["hits"]["hits"][1]["fields"]["_percolator_document_slot"],
            json!([1])
        );
        assert_eq!(body["aggregations"]["max_price"]["value"], json!(30.0));
        assert_eq!(response.ids(), vec!["1", "thinking-books"]);
    }

    #[test]
    fn test_sorted_hits_have_null_score() {
        let mut sorted = hit("1");
        sorted.sort = vec![json!(5)];
        let body = SearchResponse {
            took: Duration::ZERO,
            total: 1,
            hits: vec![sorted],
            aggregations: Vec::new(),
        }
        .to_json();
        assert_eq!(body["hits"]["max_score"], Value::Null);
        assert_eq!(body["hits"]["hits"][0]["_score"], Value::Null);
        assert_eq!(body["hits"]["hits"][0]["sort"], json!([5]));
        assert!(body.get("aggregations").is_none());
    }
}
