//! Partitioned `terms` aggregation.
//!
//! Matching documents are spread over a fixed number of partitions by a
//! stable hash of `index/id`. Each partition counts its values and keeps
//! only its `shard_size` best buckets; the reduced top `size` buckets are
//! taken from the merged partition lists. The counts dropped along the way
//! are reported as `doc_count_error_upper_bound` (the largest count any
//! partition discarded) and `sum_other_doc_count`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ahash::RandomState;

use crate::aggregation::request::{TermsAggregation, TermsOrder};
use crate::aggregation::result::{AggregationResult, Bucket};
use crate::aggregation::{AggregationTarget, aggregate};
use crate::document::FieldValue;
use crate::error::Result;
use crate::lexical::DocId;
use crate::schema::FieldType;

/// Fixed seeds so a document always lands in the same partition.
const PARTITION_SEEDS: [u64; 4] = [
    0x5157_4152_5259_0001,
    0x9e37_79b9_7f4a_7c15,
    0xc2b2_ae3d_27d4_eb4f,
    0x1656_67b1_9e37_79f9,
];

/// A bucket key ordered by [`FieldValue::total_cmp`].
#[derive(Debug, Clone)]
struct TermKey(FieldValue);

impl PartialEq for TermKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for TermKey {}

impl PartialOrd for TermKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TermKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

fn sort_buckets(buckets: &mut [(TermKey, u64)], order: TermsOrder) {
    buckets.sort_by(|(a_key, a_count), (b_key, b_count)| {
        order.compare(a_key.cmp(b_key), *a_count, *b_count)
    });
}

/// Partition of a document: stable for a given index name and id.
pub fn partition_of(index: &str, id: &str, partitions: usize) -> usize {
    let [k0, k1, k2, k3] = PARTITION_SEEDS;
    let hasher = RandomState::with_seeds(k0, k1, k2, k3);
    (hasher.hash_one(format!("{index}/{id}")) % partitions.max(1) as u64) as usize
}

/// The distinct values a document holds for `field`.
fn distinct_values<'a>(target: &'a AggregationTarget<'_>, field: &str, doc_id: DocId) -> Vec<&'a FieldValue> {
    let mut values: Vec<&FieldValue> = target.state.doc_values().values(field, doc_id).iter().collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    values
}

/// Whether `target` can be bucketed on `field`. Text fields and unmapped
/// fields contribute nothing.
fn aggregatable(target: &AggregationTarget<'_>, field: &str) -> bool {
    match target.mapping.resolve(field) {
        Some(field_type) if field_type.has_doc_values() => true,
        Some(FieldType::Text) => {
            tracing::debug!(
                "terms aggregation on text field [{field}] of [{}] yields no buckets",
                target.state.index_name()
            );
            false
        }
        _ => false,
    }
}

pub fn terms(agg: &TermsAggregation, targets: &[AggregationTarget<'_>]) -> Result<AggregationResult> {
    let partitions = agg
        .partitions
        .unwrap_or_else(|| targets.iter().map(|t| t.shards as usize).sum())
        .max(1);
    let shard_size = agg.effective_shard_size();

    let mut local: Vec<BTreeMap<TermKey, u64>> = vec![BTreeMap::new(); partitions];
    let mut occurrences = 0u64;
    for target in targets.iter().filter(|t| aggregatable(t, &agg.field)) {
        let index = target.state.index_name();
        for &doc_id in &target.docs {
            let Some(doc) = target.state.document(doc_id) else {
                continue;
            };
            let values = distinct_values(target, &agg.field, doc_id);
            if values.is_empty() {
                continue;
            }
            let counts = &mut local[partition_of(index, &doc.id, partitions)];
            for value in values {
                *counts.entry(TermKey(value.clone())).or_default() += 1;
                occurrences += 1;
            }
        }
    }

    let mut merged: BTreeMap<TermKey, u64> = BTreeMap::new();
    let mut error = 0u64;
    for counts in local {
        let mut buckets: Vec<(TermKey, u64)> = counts.into_iter().collect();
        sort_buckets(&mut buckets, agg.order);
        if buckets.len() > shard_size {
            let discarded = buckets.split_off(shard_size);
            error = error.max(discarded.iter().map(|(_, count)| *count).max().unwrap_or(0));
        }
        for (key, count) in buckets {
            *merged.entry(key).or_default() += count;
        }
    }
    // A single partition sees every value, so its returned counts are exact.
    if partitions == 1 {
        error = 0;
    }

    let mut buckets: Vec<(TermKey, u64)> = merged
        .into_iter()
        .filter(|(_, count)| *count >= agg.min_doc_count)
        .collect();
    sort_buckets(&mut buckets, agg.order);
    buckets.truncate(agg.size);

    let returned: u64 = buckets.iter().map(|(_, count)| *count).sum();
    let sum_other_doc_count = occurrences.saturating_sub(returned);

    let buckets = buckets
        .into_iter()
        .map(|(TermKey(key), doc_count)| {
            let aggregations = if agg.aggs.is_empty() {
                Vec::new()
            } else {
                let narrowed: Vec<AggregationTarget<'_>> = targets
                    .iter()
                    .map(|target| target.narrow(bucket_docs(target, &agg.field, &key)))
                    .collect();
                aggregate(&agg.aggs, &narrowed)?
            };
            Ok(Bucket {
                key,
                doc_count,
                aggregations,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AggregationResult::Terms {
        doc_count_error_upper_bound: error,
        sum_other_doc_count,
        buckets,
    })
}

/// Documents of `target` holding `key` in `field`.
fn bucket_docs(target: &AggregationTarget<'_>, field: &str, key: &FieldValue) -> BTreeSet<DocId> {
    if !aggregatable(target, field) {
        return BTreeSet::new();
    }
    target
        .docs
        .iter()
        .copied()
        .filter(|doc_id| {
            target
                .state
                .doc_values()
                .values(field, *doc_id)
                .iter()
                .any(|value| value.total_cmp(key) == Ordering::Equal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::request::{AggregationRequest, MetricKind};
    use crate::aggregation::tests::state_with;
    use serde_json::{Value, json};

    fn states(n: usize, state_of: impl Fn(usize) -> String) -> Vec<Value> {
        (0..n).map(|i| json!({"state": state_of(i), "age": i % 50})).collect()
    }

    #[test]
    fn test_single_partition_is_exact() {
        let (state, mapping) = state_with(vec![
            json!({"state": "ID"}),
            json!({"state": "ID"}),
            json!({"state": "TX"}),
            json!({"state": "AL"}),
            json!({"other": 1}),
        ]);
        let targets = [AggregationTarget::new(&state, &mapping, state.doc_ids(), 1)];
        let result = terms(&TermsAggregation::new("state.keyword").with_size(2), &targets).unwrap();

        let AggregationResult::Terms {
            doc_count_error_upper_bound,
            sum_other_doc_count,
            buckets,
        } = result
        else {
            panic!("expected terms result");
        };
        assert_eq!(doc_count_error_upper_bound, 0);
        assert_eq!(sum_other_doc_count, 1);
        let keys: Vec<_> = buckets.iter().map(|b| (b.key.to_string(), b.doc_count)).collect();
        // Ties on count order by key ascending.
        assert_eq!(keys, vec![("ID".to_string(), 2), ("AL".to_string(), 1)]);
    }

    #[test]
    fn test_partitioned_counts_report_error_bounds() {
        // 60 distinct states with skewed frequencies.
        let (state, mapping) = state_with(states(600, |i| format!("S{:02}", (i * i) % 60)));
        let targets = [AggregationTarget::new(&state, &mapping, state.doc_ids(), 1)];
        let agg = TermsAggregation::new("state.keyword")
            .with_size(5)
            .with_shard_size(5)
            .with_partitions(5);
        let AggregationResult::Terms {
            doc_count_error_upper_bound,
            sum_other_doc_count,
            buckets,
        } = terms(&agg, &targets).unwrap()
        else {
            panic!("expected terms result");
        };

        let returned: u64 = buckets.iter().map(|b| b.doc_count).sum();
        assert_eq!(buckets.len(), 5);
        assert_eq!(returned + sum_other_doc_count, 600);
        assert!(doc_count_error_upper_bound > 0);
        for pair in buckets.windows(2) {
            assert!(pair[0].doc_count >= pair[1].doc_count);
        }
    }

    #[test]
    fn test_partition_is_stable() {
        assert_eq!(partition_of("bank", "17", 5), partition_of("bank", "17", 5));
        assert!(partition_of("bank", "17", 5) < 5);
        assert_eq!(partition_of("bank", "17", 0), 0);
    }

    #[test]
    fn test_text_field_and_sub_aggregations() {
        let (state, mapping) = state_with(vec![
            json!({"state": "ID", "age": 30}),
            json!({"state": "ID", "age": 50}),
            json!({"state": "TX", "age": 20}),
        ]);
        let targets = [AggregationTarget::new(&state, &mapping, state.doc_ids(), 1)];

        let text = terms(&TermsAggregation::new("state"), &targets).unwrap();
        assert!(text.buckets().is_empty());

        let agg = TermsAggregation::new("state.keyword").with_sub_aggregation(
            "avg_age",
            AggregationRequest::Metric {
                kind: MetricKind::Avg,
                field: "age".into(),
            },
        );
        let result = terms(&agg, &targets).unwrap();
        let idaho = &result.buckets()[0];
        assert_eq!(idaho.key, FieldValue::Text("ID".into()));
        assert_eq!(idaho.aggregation("avg_age").and_then(|r| r.value()), Some(40.0));
    }

    #[test]
    fn test_multi_valued_counts_each_value_once_per_doc() {
        let (state, mapping) = state_with(vec![
            json!({"tags": ["a", "b", "a"]}),
            json!({"tags": ["a"]}),
        ]);
        let targets = [AggregationTarget::new(&state, &mapping, state.doc_ids(), 1)];
        let result = terms(&TermsAggregation::new("tags.keyword"), &targets).unwrap();
        let counts: Vec<_> = result.buckets().iter().map(|b| b.doc_count).collect();
        assert_eq!(counts, vec![2, 1]);
    }
}
