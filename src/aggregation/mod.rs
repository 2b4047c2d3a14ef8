//! Aggregations computed over the matching documents of a search.

pub mod metrics;
pub mod request;
pub mod result;
pub mod terms;

use std::collections::BTreeSet;

use crate::error::Result;
use crate::lexical::DocId;
use crate::schema::Mapping;
use crate::search::SearchableState;

pub use request::{AggregationRequest, MetricKind, TermsAggregation, TermsOrder};
pub use result::{AggregationResult, Bucket};

/// The matching documents of one searched index.
#[derive(Debug, Clone)]
pub struct AggregationTarget<'a> {
    pub state: &'a SearchableState,
    pub mapping: &'a Mapping,
    pub docs: BTreeSet<DocId>,
    /// Shard count of the index, used as its default partition count.
    pub shards: u32,
}

impl<'a> AggregationTarget<'a> {
    pub fn new(state: &'a SearchableState, mapping: &'a Mapping, docs: BTreeSet<DocId>, shards: u32) -> Self {
        AggregationTarget {
            state,
            mapping,
            docs,
            shards,
        }
    }

    fn narrow(&self, docs: BTreeSet<DocId>) -> Self {
        AggregationTarget {
            docs,
            ..self.clone()
        }
    }
}

/// Run every named aggregation over `targets`.
pub fn aggregate(
    requests: &[(String, AggregationRequest)],
    targets: &[AggregationTarget<'_>],
) -> Result<Vec<(String, AggregationResult)>> {
    requests
        .iter()
        .map(|(name, request)| {
            let result = match request {
                AggregationRequest::Terms(agg) => terms::terms(agg, targets)?,
                AggregationRequest::Metric { kind, field } => metrics::metric(*kind, field, targets),
            };
            Ok((name.clone(), result))
        })
        .collect()
}
