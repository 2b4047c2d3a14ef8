//! Aggregation results.

use serde_json::{Map, Value, json};

use crate::document::FieldValue;

/// One bucket of a `terms` aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: FieldValue,
    pub doc_count: u64,
    pub aggregations: Vec<(String, AggregationResult)>,
}

impl Bucket {
    pub fn aggregation(&self, name: &str) -> Option<&AggregationResult> {
        find(&self.aggregations, name)
    }

    fn to_json(&self) -> Value {
        let mut object = Map::new();
        match &self.key {
            // Boolean keys render as 1/0 with a string form alongside.
            FieldValue::Boolean(b) => {
                object.insert("key".into(), json!(u8::from(*b)));
                object.insert("key_as_string".into(), json!(b.to_string()));
            }
            key => {
                object.insert("key".into(), key.to_json());
            }
        }
        object.insert("doc_count".into(), json!(self.doc_count));
        for (name, result) in &self.aggregations {
            object.insert(name.clone(), result.to_json());
        }
        Value::Object(object)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationResult {
    Terms {
        /// Worst-case undercount of any returned bucket.
        doc_count_error_upper_bound: u64,
        /// Value occurrences counted but not in a returned bucket.
        sum_other_doc_count: u64,
        buckets: Vec<Bucket>,
    },
    /// A single metric value; `None` renders as `null`.
    Metric(Option<f64>),
}

impl AggregationResult {
    pub fn buckets(&self) -> &[Bucket] {
        match self {
            AggregationResult::Terms { buckets, .. } => buckets,
            AggregationResult::Metric(_) => &[],
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            AggregationResult::Metric(value) => *value,
            AggregationResult::Terms { .. } => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AggregationResult::Terms {
                doc_count_error_upper_bound,
                sum_other_doc_count,
                buckets,
            } => json!({
                "doc_count_error_upper_bound": doc_count_error_upper_bound,
                "sum_other_doc_count": sum_other_doc_count,
                "buckets": buckets.iter().map(Bucket::to_json).collect::<Vec<_>>(),
            }),
            AggregationResult::Metric(value) => json!({ "value": value }),
        }
    }
}

/// Look up a named result.
pub fn find<'a>(results: &'a [(String, AggregationResult)], name: &str) -> Option<&'a AggregationResult> {
    results
        .iter()
        .find(|(candidate, _)| candidate == name)
        .map(|(_, result)| result)
}
