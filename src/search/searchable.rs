//! The refreshed, searchable view of one index.
//!
//! Writes land in the document store immediately but only reach a
//! [`SearchableState`] when the index refreshes. Everything a search reads
//! (inverted index, doc values, geo shapes, percolator queries and the
//! sources returned in hits) lives here.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::FieldAnalyzers;
use crate::document::{FieldValue, ParsedDocument, Source};
use crate::error::Result;
use crate::geo::GeoIndex;
use crate::lexical::{DocId, DocValues, InvertedIndex};
use crate::percolator::PercolatorIndex;
use crate::schema::{FieldType, Mapping};

/// Position gap between the elements of an array value, so that terms of
/// different elements are never adjacent.
const POSITION_GAP: u32 = 100;

/// A document as seen by search.
#[derive(Debug, Clone)]
pub struct LiveDocument {
    pub id: String,
    pub version: u64,
    pub seq_no: u64,
    pub source: Arc<Source>,
}

#[derive(Debug, Clone)]
pub struct SearchableState {
    index: String,
    analyzers: Arc<FieldAnalyzers>,
    inverted: InvertedIndex,
    doc_values: DocValues,
    geo: GeoIndex,
    percolator: PercolatorIndex,
    docs: BTreeMap<DocId, LiveDocument>,
    ids: AHashMap<String, DocId>,
    next_doc_id: DocId,
}

impl SearchableState {
    pub fn new<S: Into<String>>(index: S, analyzers: Arc<FieldAnalyzers>) -> Self {
        SearchableState {
            index: index.into(),
            analyzers,
            inverted: InvertedIndex::new(),
            doc_values: DocValues::new(),
            geo: GeoIndex::new(),
            percolator: PercolatorIndex::new(),
            docs: BTreeMap::new(),
            ids: AHashMap::new(),
            next_doc_id: 0,
        }
    }

    /// Make a parsed document searchable, replacing any previous version.
    pub fn upsert(
        &mut self,
        id: &str,
        version: u64,
        seq_no: u64,
        source: Arc<Source>,
        parsed: &ParsedDocument,
        mapping: &Mapping,
    ) -> Result<DocId> {
        self.delete(id);

        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;

        let mut offsets: AHashMap<&str, u32> = AHashMap::new();
        for field in &parsed.fields {
            let path = field.path.as_str();
            match (&field.field_type, &field.value) {
                (field_type, FieldValue::Text(text)) if field_type.is_analyzed() => {
                    if let Some(analyzer) = self.analyzers.for_type(field.field_type) {
                        let tokens = analyzer.tokens(text)?;
                        let offset = offsets.entry(path).or_insert(0);
                        self.inverted.add_tokens(doc_id, path, &tokens, *offset);
                        let last = tokens.iter().map(|t| t.position as u32).max().unwrap_or(0);
                        *offset += last + 1 + POSITION_GAP;
                    }
                    if field.field_type == FieldType::Keyword {
                        self.doc_values.add_value(path, doc_id, field.value.clone());
                    }
                }
                (FieldType::GeoPoint | FieldType::GeoShape, FieldValue::Geo(shape)) => {
                    self.geo.index_shape(path, doc_id, shape.clone());
                }
                (FieldType::Percolator, FieldValue::Query(query)) => {
                    self.percolator.register(
                        path,
                        doc_id,
                        Arc::clone(query),
                        mapping,
                        &self.analyzers,
                    );
                }
                (field_type, value) if field_type.has_doc_values() => {
                    self.doc_values.add_value(path, doc_id, value.clone());
                }
                (field_type, value) => {
                    tracing::warn!(
                        "skipping value of type [{}] for [{path}] of type [{field_type}]",
                        value.type_name()
                    );
                }
            }
        }
        for path in &parsed.present {
            self.doc_values.mark_present(path, doc_id);
        }

        self.ids.insert(id.to_string(), doc_id);
        self.docs.insert(
            doc_id,
            LiveDocument {
                id: id.to_string(),
                version,
                seq_no,
                source,
            },
        );
        Ok(doc_id)
    }

    /// Remove a document from every structure. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(doc_id) = self.ids.remove(id) else {
            return false;
        };
        self.docs.remove(&doc_id);
        self.inverted.remove_document(doc_id);
        self.doc_values.remove_document(doc_id);
        self.geo.remove_document(doc_id);
        self.percolator.remove_document(doc_id);
        true
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    pub fn analyzers(&self) -> &Arc<FieldAnalyzers> {
        &self.analyzers
    }

    pub fn inverted(&self) -> &InvertedIndex {
        &self.inverted
    }

    pub fn doc_values(&self) -> &DocValues {
        &self.doc_values
    }

    pub fn geo(&self) -> &GeoIndex {
        &self.geo
    }

    pub fn percolator(&self) -> &PercolatorIndex {
        &self.percolator
    }

    pub fn document(&self, doc_id: DocId) -> Option<&LiveDocument> {
        self.docs.get(&doc_id)
    }

    pub fn doc_id(&self, id: &str) -> Option<DocId> {
        self.ids.get(id).copied()
    }

    /// Every searchable document.
    pub fn doc_ids(&self) -> BTreeSet<DocId> {
        self.docs.keys().copied().collect()
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocId, &LiveDocument)> {
        self.docs.iter().map(|(doc_id, doc)| (*doc_id, doc))
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
