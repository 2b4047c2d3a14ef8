//! Query execution over one or more refreshed indices.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rayon::prelude::*;
use serde_json::{Value, json};

use crate::aggregation::{AggregationTarget, aggregate};
use crate::error::{QuarryError, Result};
use crate::lexical::DocId;
use crate::query::Evaluator;
use crate::schema::Mapping;
use crate::search::request::SearchRequest;
use crate::search::response::{CONSTANT_SCORE, SearchHit, SearchResponse};
use crate::search::searchable::SearchableState;
use crate::search::sort::{SortField, SortKey, compare_keys, sort_key};

/// A consistent view of one index: its searchable state and the mapping in
/// force when the view was taken.
#[derive(Debug, Clone, Copy)]
pub struct IndexView<'a> {
    pub state: &'a SearchableState,
    pub mapping: &'a Mapping,
    pub shards: u32,
}

impl<'a> IndexView<'a> {
    pub fn new(state: &'a SearchableState, mapping: &'a Mapping, shards: u32) -> Self {
        IndexView {
            state,
            mapping,
            shards,
        }
    }

    pub fn name(&self) -> &str {
        self.state.index_name()
    }
}

struct ViewMatches {
    docs: BTreeSet<DocId>,
    slots: BTreeMap<DocId, Vec<usize>>,
}

struct Candidate<'a> {
    view: usize,
    doc_id: DocId,
    index: &'a str,
    id: &'a str,
    key: SortKey,
}

pub struct Searcher<'a> {
    views: Vec<IndexView<'a>>,
    max_result_window: usize,
}

impl<'a> Searcher<'a> {
    pub fn new(views: Vec<IndexView<'a>>, max_result_window: usize) -> Self {
        Searcher {
            views,
            max_result_window,
        }
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        if request.from.saturating_add(request.size) > self.max_result_window {
            return Err(QuarryError::invalid_request(format!(
                "Result window is too large, from + size must be less than or equal to: [{}] but was [{}]",
                self.max_result_window,
                request.from.saturating_add(request.size)
            )));
        }

        let matches = self
            .views
            .par_iter()
            .map(|view| {
                let evaluator = Evaluator::new(view.state, view.mapping);
                let docs = evaluator.evaluate(&request.query)?;
                Ok(ViewMatches {
                    docs,
                    slots: evaluator.into_slots(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let total = matches.iter().map(|m| m.docs.len()).sum();

        let aggregations = if request.aggs.is_empty() {
            Vec::new()
        } else {
            let targets: Vec<AggregationTarget<'_>> = self
                .views
                .iter()
                .zip(&matches)
                .map(|(view, m)| AggregationTarget::new(view.state, view.mapping, m.docs.clone(), view.shards))
                .collect();
            aggregate(&request.aggs, &targets)?
        };

        let mut candidates = Vec::with_capacity(total);
        for (position, (view, m)) in self.views.iter().zip(&matches).enumerate() {
            for &doc_id in &m.docs {
                let Some(doc) = view.state.document(doc_id) else {
                    continue;
                };
                let key = sort_key(view.state, view.mapping, doc_id, &doc.id, &request.sort)?;
                candidates.push(Candidate {
                    view: position,
                    doc_id,
                    index: view.name(),
                    id: &doc.id,
                    key,
                });
            }
        }
        candidates.sort_by(|a, b| {
            compare_keys(&a.key, &b.key, &request.sort)
                .then_with(|| a.index.cmp(b.index))
                .then_with(|| a.id.cmp(b.id))
        });

        let sorted = request.sort.iter().any(|field| *field != SortField::Score);
        let hits = candidates
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .filter_map(|candidate| {
                let view = &self.views[candidate.view];
                let doc = view.state.document(candidate.doc_id)?;
                let sort = if sorted {
                    sort_values(&candidate.key, &request.sort)
                } else {
                    Vec::new()
                };
                Some(SearchHit {
                    index: view.name().to_string(),
                    id: doc.id.clone(),
                    version: doc.version,
                    seq_no: doc.seq_no,
                    source: request.source.then(|| doc.source.clone()),
                    sort,
                    percolator_slots: matches[candidate.view].slots.get(&candidate.doc_id).cloned(),
                })
            })
            .collect();

        let took = started.elapsed();
        tracing::debug!(
            "searched {} index(es): {total} hit(s) in {:?}",
            self.views.len(),
            took
        );
        Ok(SearchResponse {
            took,
            total,
            hits,
            aggregations,
        })
    }

    /// Number of matching documents.
    pub fn count(&self, request: &SearchRequest) -> Result<usize> {
        self.views
            .par_iter()
            .map(|view| Ok(Evaluator::new(view.state, view.mapping).evaluate(&request.query)?.len()))
            .collect::<Result<Vec<_>>>()
            .map(|counts| counts.into_iter().sum())
    }
}

fn sort_values(key: &SortKey, sort: &[SortField]) -> Vec<Value> {
    key.iter()
        .zip(sort)
        .map(|(value, field)| match (field, value) {
            (SortField::Score, _) => json!(CONSTANT_SCORE),
            (_, Some(value)) => value.to_json(),
            (_, None) => Value::Null,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::aggregation::{AggregationRequest, TermsAggregation};
    use crate::analysis::FieldAnalyzers;
    use crate::document::DocumentParser;
    use crate::query::QueryNode;
    use crate::search::sort::SortOrder;

    fn state(name: &str, docs: Vec<(String, Value)>) -> (SearchableState, Mapping) {
        let mut mapping = Mapping::new();
        let mut state = SearchableState::new(name, Arc::new(FieldAnalyzers::new().unwrap()));
        for (seq_no, (id, doc)) in docs.into_iter().enumerate() {
            let source = doc.as_object().cloned().unwrap();
            let parsed = DocumentParser::parse(&source, &mapping).unwrap();
            if let Some(updated) = parsed.mapping_update.clone() {
                mapping = updated;
            }
            state
                .upsert(&id, 1, seq_no as u64, Arc::new(source), &parsed, &mapping)
                .unwrap();
        }
        (state, mapping)
    }

    fn accounts() -> (SearchableState, Mapping) {
        state(
            "bank",
            (0..25)
                .map(|n| {
                    let state = if n % 3 == 0 { "ID" } else { "TX" };
                    (n.to_string(), json!({"account_number": n, "state": state}))
                })
                .collect(),
        )
    }

    #[test]
    fn test_paging_and_sort() {
        let (bank, mapping) = accounts();
        let searcher = Searcher::new(vec![IndexView::new(&bank, &mapping, 1)], 10_000);
        let request = SearchRequest::new()
            .with_sort(vec![SortField::field("account_number", SortOrder::Desc)])
            .with_from(2)
            .with_size(3);
        let response = searcher.search(&request).unwrap();

        assert_eq!(response.total, 25);
        assert_eq!(response.ids(), vec!["22", "21", "20"]);
        assert_eq!(response.hits[0].sort, vec![json!(22)]);
    }

    #[test]
    fn test_default_order_is_index_then_id() {
        let (a, a_mapping) = state("a", vec![("2".into(), json!({"x": 1})), ("10".into(), json!({"x": 1}))]);
        let (b, b_mapping) = state("b", vec![("1".into(), json!({"x": 1}))]);
        let searcher = Searcher::new(
            vec![IndexView::new(&b, &b_mapping, 1), IndexView::new(&a, &a_mapping, 1)],
            10_000,
        );
        let response = searcher.search(&SearchRequest::new()).unwrap();
        let order: Vec<_> = response.hits.iter().map(|h| (h.index.as_str(), h.id.as_str())).collect();
        assert_eq!(order, vec![("a", "10"), ("a", "2"), ("b", "1")]);
        assert!(response.hits.iter().all(|h| h.sort.is_empty()));
    }

    #[test]
    fn test_result_window() {
        let (bank, mapping) = accounts();
        let searcher = Searcher::new(vec![IndexView::new(&bank, &mapping, 1)], 20);
        let err = searcher
            .search(&SearchRequest::new().with_from(15).with_size(10))
            .unwrap_err();
        assert!(err.to_string().contains("Result window is too large"));
    }

    #[test]
    fn test_size_zero_with_aggregations() {
        let (bank, mapping) = accounts();
        let searcher = Searcher::new(vec![IndexView::new(&bank, &mapping, 1)], 10_000);
        let request = SearchRequest::new()
            .with_query(QueryNode::term("state.keyword", "ID"))
            .with_size(0)
            .with_aggregation(
                "states",
                AggregationRequest::Terms(TermsAggregation::new("state.keyword")),
            );
        let response = searcher.search(&request).unwrap();

        assert!(response.hits.is_empty());
        assert_eq!(response.total, 9);
        let buckets = response.aggregation("states").unwrap().buckets();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].doc_count, 9);
        assert_eq!(searcher.count(&request).unwrap(), 9);
    }

    #[test]
    fn test_sort_on_text_field_fails() {
        let (bank, mapping) = accounts();
        let searcher = Searcher::new(vec![IndexView::new(&bank, &mapping, 1)], 10_000);
        let request = SearchRequest::new().with_sort(vec![SortField::field("state", SortOrder::Asc)]);
        assert!(searcher.search(&request).is_err());
    }
}
