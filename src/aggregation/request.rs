//! Aggregation requests and their JSON form.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::{QuarryError, Result};

/// Bucket ordering of a `terms` aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TermsOrder {
    #[default]
    CountDesc,
    CountAsc,
    KeyAsc,
    KeyDesc,
}

impl TermsOrder {
    /// Compare `(key ordering, count)` pairs. Count orders break ties by key
    /// ascending.
    pub fn compare(&self, key_cmp: Ordering, a_count: u64, b_count: u64) -> Ordering {
        match self {
            TermsOrder::CountDesc => b_count.cmp(&a_count).then(key_cmp),
            TermsOrder::CountAsc => a_count.cmp(&b_count).then(key_cmp),
            TermsOrder::KeyAsc => key_cmp,
            TermsOrder::KeyDesc => key_cmp.reverse(),
        }
    }

    fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| QuarryError::invalid_request(format!("invalid terms order {value}")))?;
        let (key, direction) = object.iter().next().ok_or_else(|| {
            QuarryError::invalid_request(format!("invalid terms order {value}"))
        })?;
        let descending = match direction.as_str() {
            Some(d) if d.eq_ignore_ascii_case("desc") => true,
            Some(d) if d.eq_ignore_ascii_case("asc") => false,
            _ => {
                return Err(QuarryError::invalid_request(format!(
                    "invalid terms order direction {direction}"
                )));
            }
        };
        match (key.as_str(), descending) {
            ("_count", true) => Ok(TermsOrder::CountDesc),
            ("_count", false) => Ok(TermsOrder::CountAsc),
            ("_key" | "_term", false) => Ok(TermsOrder::KeyAsc),
            ("_key" | "_term", true) => Ok(TermsOrder::KeyDesc),
            (other, _) => Err(QuarryError::invalid_request(format!(
                "unsupported terms order key [{other}]"
            ))),
        }
    }
}

/// A `terms` bucket aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct TermsAggregation {
    pub field: String,
    pub size: usize,
    pub shard_size: Option<usize>,
    /// Number of partitions counted independently; defaults to the total
    /// shard count of the searched indices.
    pub partitions: Option<usize>,
    pub min_doc_count: u64,
    pub order: TermsOrder,
    pub aggs: Vec<(String, AggregationRequest)>,
}

impl TermsAggregation {
    pub const DEFAULT_SIZE: usize = 10;

    pub fn new<S: Into<String>>(field: S) -> Self {
        TermsAggregation {
            field: field.into(),
            size: Self::DEFAULT_SIZE,
            shard_size: None,
            partitions: None,
            min_doc_count: 1,
            order: TermsOrder::default(),
            aggs: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = Some(shard_size);
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = Some(partitions);
        self
    }

    pub fn with_order(mut self, order: TermsOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_sub_aggregation<S: Into<String>>(mut self, name: S, agg: AggregationRequest) -> Self {
        self.aggs.push((name.into(), agg));
        self
    }

    /// Buckets each partition keeps: `size * 1.5 + 10` unless set, never
    /// below `size`.
    pub fn effective_shard_size(&self) -> usize {
        let default = self.size + self.size / 2 + 10;
        self.shard_size.unwrap_or(default).max(self.size)
    }
}

/// Single-value metrics over numeric doc values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Avg,
    Sum,
    Min,
    Max,
    ValueCount,
}

impl MetricKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "avg" => Some(MetricKind::Avg),
            "sum" => Some(MetricKind::Sum),
            "min" => Some(MetricKind::Min),
            "max" => Some(MetricKind::Max),
            "value_count" => Some(MetricKind::ValueCount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationRequest {
    Terms(TermsAggregation),
    Metric { kind: MetricKind, field: String },
}

impl AggregationRequest {
    /// Parse an `aggs` object: `{name: {type: {...}, aggs?: {...}}}`.
    pub fn parse_all(value: &Value) -> Result<Vec<(String, AggregationRequest)>> {
        AggregationRequest::parse_all_with_size(value, TermsAggregation::DEFAULT_SIZE)
    }

    /// Like [`parse_all`](Self::parse_all), with the bucket count used by
    /// `terms` aggregations that leave `size` out.
    pub fn parse_all_with_size(
        value: &Value,
        default_terms_size: usize,
    ) -> Result<Vec<(String, AggregationRequest)>> {
        let object = value
            .as_object()
            .ok_or_else(|| QuarryError::invalid_request("[aggs] must be an object"))?;
        object
            .iter()
            .map(|(name, body)| {
                let agg = AggregationRequest::from_json(name, body, default_terms_size)?;
                Ok((name.clone(), agg))
            })
            .collect()
    }

    fn from_json(name: &str, body: &Value, default_terms_size: usize) -> Result<Self> {
        let object = body.as_object().ok_or_else(|| {
            QuarryError::invalid_request(format!("aggregation [{name}] must be an object"))
        })?;
        let sub_aggs = match object.get("aggs").or_else(|| object.get("aggregations")) {
            Some(sub) => AggregationRequest::parse_all_with_size(sub, default_terms_size)?,
            None => Vec::new(),
        };
        let mut kinds = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "aggs" | "aggregations" | "meta"));
        let (kind, options) = match (kinds.next(), kinds.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(QuarryError::invalid_request(format!(
                    "aggregation [{name}] must define exactly one type"
                )));
            }
        };
        let field = options
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                QuarryError::invalid_request(format!("aggregation [{name}] requires a [field]"))
            })?
            .to_string();

        if kind == "terms" {
            let mut terms = TermsAggregation::new(field);
            terms.size = usize_option(options, "size", name)?.unwrap_or(default_terms_size);
            terms.shard_size = usize_option(options, "shard_size", name)?;
            terms.partitions = usize_option(options, "partitions", name)?;
            if terms.partitions == Some(0) {
                return Err(QuarryError::invalid_request(format!(
                    "aggregation [{name}]: [partitions] must be greater than 0"
                )));
            }
            terms.min_doc_count = usize_option(options, "min_doc_count", name)?
                .map(|n| n as u64)
                .unwrap_or(1);
            if let Some(order) = options.get("order") {
                terms.order = TermsOrder::from_json(order)?;
            }
            terms.aggs = sub_aggs;
            return Ok(AggregationRequest::Terms(terms));
        }

        let kind = MetricKind::parse(kind).ok_or_else(|| {
            QuarryError::invalid_request(format!("unknown aggregation type [{kind}] for [{name}]"))
        })?;
        if !sub_aggs.is_empty() {
            return Err(QuarryError::invalid_request(format!(
                "aggregator [{name}] of type [{kind:?}] cannot accept sub-aggregations"
            )));
        }
        Ok(AggregationRequest::Metric { kind, field })
    }
}

fn usize_option(options: &Value, key: &str, name: &str) -> Result<Option<usize>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().and_then(|n| usize::try_from(n).ok()).map(Some).ok_or_else(|| {
            QuarryError::invalid_request(format!(
                "aggregation [{name}]: [{key}] must be a non-negative integer"
            ))
        }),
    }
}
