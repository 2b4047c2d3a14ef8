//! Registered percolator queries and reverse matching.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ahash::AHashMap;
use rayon::prelude::*;

use crate::analysis::FieldAnalyzers;
use crate::document::{DocumentParser, Source};
use crate::error::Result;
use crate::lexical::DocId;
use crate::percolator::extractor::{Extraction, extract};
use crate::query::{Evaluator, QueryNode};
use crate::schema::Mapping;
use crate::search::SearchableState;

/// Name of the throwaway index candidate documents are indexed into.
const CANDIDATE_INDEX: &str = "_percolate";

#[derive(Debug, Clone)]
struct RegisteredQuery {
    query: Arc<QueryNode>,
    extraction: Extraction,
}

#[derive(Debug, Clone, Default)]
struct PercolatorField {
    queries: BTreeMap<DocId, Vec<RegisteredQuery>>,
    terms: AHashMap<(String, String), BTreeSet<DocId>>,
    verify: BTreeSet<DocId>,
}

impl PercolatorField {
    fn remove(&mut self, doc_id: DocId) {
        let Some(registered) = self.queries.remove(&doc_id) else {
            return;
        };
        for query in registered {
            if let Extraction::Terms(terms) = query.extraction {
                for key in terms {
                    if let Some(docs) = self.terms.get_mut(&key) {
                        docs.remove(&doc_id);
                        if docs.is_empty() {
                            self.terms.remove(&key);
                        }
                    }
                }
            }
        }
        self.verify.remove(&doc_id);
    }
}

/// The stored queries of every percolator field in one searchable state.
#[derive(Debug, Clone, Default)]
pub struct PercolatorIndex {
    fields: AHashMap<String, PercolatorField>,
}

impl PercolatorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query held by document `doc_id` in `field`.
    pub fn register(
        &mut self,
        field: &str,
        doc_id: DocId,
        query: Arc<QueryNode>,
        mapping: &Mapping,
        analyzers: &FieldAnalyzers,
    ) {
        let extraction = extract(&query, mapping, analyzers);
        let entry = self.fields.entry(field.to_string()).or_default();
        match &extraction {
            Extraction::Terms(terms) => {
                for key in terms {
                    entry.terms.entry(key.clone()).or_default().insert(doc_id);
                }
            }
            Extraction::VerifyAlways => {
                entry.verify.insert(doc_id);
            }
        }
        tracing::trace!("registered percolator query in [{field}] for doc {doc_id}: {extraction:?}");
        entry
            .queries
            .entry(doc_id)
            .or_default()
            .push(RegisteredQuery { query, extraction });
    }

    pub fn remove_document(&mut self, doc_id: DocId) {
        self.fields.retain(|_, field| {
            field.remove(doc_id);
            !field.queries.is_empty()
        });
    }

    /// Number of stored queries across fields.
    pub fn len(&self) -> usize {
        self.fields
            .values()
            .flat_map(|field| field.queries.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Match the queries stored in `field` against `documents`.
    ///
    /// The candidates are indexed into a throwaway state using `mapping`
    /// (the mapping of the index holding the queries). Returns, per matching
    /// query document, the 1-based slots of the candidates it matched.
    pub fn percolate(
        &self,
        field: &str,
        documents: &[Source],
        mapping: &Mapping,
        analyzers: &Arc<FieldAnalyzers>,
    ) -> Result<BTreeMap<DocId, Vec<usize>>> {
        let Some(registered) = self.fields.get(field) else {
            return Ok(BTreeMap::new());
        };
        if documents.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut candidates = SearchableState::new(CANDIDATE_INDEX, Arc::clone(analyzers));
        let mut local_mapping = mapping.clone();
        for (position, source) in documents.iter().enumerate() {
            let parsed = DocumentParser::parse(source, &local_mapping)?;
            if let Some(updated) = &parsed.mapping_update {
                local_mapping = updated.clone();
            }
            let slot = position + 1;
            candidates.upsert(
                &slot.to_string(),
                1,
                position as u64,
                Arc::new(source.clone()),
                &parsed,
                &local_mapping,
            )?;
        }

        let mut to_verify: BTreeSet<DocId> = registered.verify.clone();
        for doc_id in candidates.doc_ids() {
            for key in candidates.inverted().document_terms(doc_id) {
                if let Some(docs) = registered.terms.get(key) {
                    to_verify.extend(docs.iter().copied());
                }
            }
        }
        tracing::debug!(
            "percolating {} document(s) against {} of {} stored queries in [{field}]",
            documents.len(),
            to_verify.len(),
            registered.queries.len()
        );

        let candidates = &candidates;
        let local_mapping = &local_mapping;
        let matches: BTreeMap<DocId, Vec<usize>> = to_verify
            .into_par_iter()
            .filter_map(|query_doc| {
                let queries = registered.queries.get(&query_doc)?;
                let mut slots = BTreeSet::new();
                for registered_query in queries {
                    let evaluator = Evaluator::new(candidates, local_mapping);
                    match evaluator.evaluate(&registered_query.query) {
                        Ok(matched) => slots.extend(
                            matched
                                .into_iter()
                                .filter_map(|doc_id| candidates.document(doc_id))
                                .filter_map(|doc| doc.id.parse::<usize>().ok()),
                        ),
                        Err(err) => {
                            tracing::warn!(
                                "stored query in doc {query_doc} failed to evaluate: {err}"
                            );
                        }
                    }
                }
                (!slots.is_empty()).then(|| (query_doc, slots.into_iter().collect()))
            })
            .collect();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn mapping() -> Mapping {
        Mapping::from_json(&json!({"properties": {
            "title": {"type": "text"},
            "price": {"type": "integer"},
            "query": {"type": "percolator"}
        }}))
        .unwrap()
    }

    fn source(value: Value) -> Source {
        value.as_object().cloned().unwrap()
    }

    fn index_with(queries: Vec<(DocId, Value)>) -> (PercolatorIndex, Arc<FieldAnalyzers>) {
        let analyzers = Arc::new(FieldAnalyzers::new().unwrap());
        let mut index = PercolatorIndex::new();
        for (doc_id, query) in queries {
            let query = Arc::new(QueryNode::from_json(&query).unwrap());
            index.register("query", doc_id, query, &mapping(), &analyzers);
        }
        (index, analyzers)
    }

    #[test]
    fn test_percolate_slots() {
        let (index, analyzers) = index_with(vec![
            (10, json!({"match": {"title": "Thinking"}})),
            (11, json!({"range": {"price": {"gte": 20}}})),
            (12, json!({"match": {"title": "cooking"}})),
        ]);
        let docs = vec![
            source(json!({"title": "Positive Thinking", "price": 10})),
            source(json!({"title": "Think Big", "price": 25})),
            source(json!({"title": "Thinking Fast", "price": 30})),
        ];
        let matches = index.percolate("query", &docs, &mapping(), &analyzers).unwrap();

        assert_eq!(matches.get(&10), Some(&vec![1, 3]));
        assert_eq!(matches.get(&11), Some(&vec![2, 3]));
        assert!(!matches.contains_key(&12));
    }

    #[test]
    fn test_percolate_unknown_field_and_empty_documents() {
        let (index, analyzers) = index_with(vec![(1, json!({"match_all": {}}))]);
        assert!(
            index
                .percolate("other", &[source(json!({"title": "x"}))], &mapping(), &analyzers)
                .unwrap()
                .is_empty()
        );
        assert!(index.percolate("query", &[], &mapping(), &analyzers).unwrap().is_empty());
    }

    #[test]
    fn test_remove_document() {
        let (mut index, analyzers) = index_with(vec![
            (1, json!({"match": {"title": "Thinking"}})),
            (2, json!({"match_all": {}})),
        ]);
        assert_eq!(index.len(), 2);
        index.remove_document(1);
        index.remove_document(2);
        assert!(index.is_empty());
        let docs = [source(json!({"title": "Thinking"}))];
        assert!(index.percolate("query", &docs, &mapping(), &analyzers).unwrap().is_empty());
    }

    #[test]
    fn test_failing_query_is_a_non_match() {
        let (index, analyzers) = index_with(vec![
            (1, json!({"script": {"script": "doc['title'].value == 'x'"}})),
            (2, json!({"match": {"price": 10}})),
        ]);
        let docs = [source(json!({"title": "x", "price": 10}))];
        let matches = index.percolate("query", &docs, &mapping(), &analyzers).unwrap();
        assert_eq!(matches.keys().copied().collect::<Vec<_>>(), vec![2]);
    }
}
