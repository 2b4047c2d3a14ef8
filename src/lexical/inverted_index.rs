//! Field → term → posting list.

use std::collections::BTreeSet;

use ahash::AHashMap;

use crate::analysis::Token;
use crate::lexical::DocId;
use crate::lexical::posting::{Posting, PostingList};

/// The inverted index of one searchable state.
///
/// A forward record per document lists the `(field, term)` pairs it
/// contributed, so removal touches exactly those posting lists. Empty
/// posting lists and empty fields are pruned.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    fields: AHashMap<String, AHashMap<String, PostingList>>,
    forward: AHashMap<DocId, Vec<(String, String)>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the analyzed tokens of one field value.
    ///
    /// `position_offset` shifts token positions so that the elements of an
    /// array value do not overlap.
    pub fn add_tokens(
        &mut self,
        doc_id: DocId,
        field: &str,
        tokens: &[Token],
        position_offset: u32,
    ) {
        let mut grouped: AHashMap<&str, Vec<u32>> = AHashMap::new();
        for token in tokens {
            grouped
                .entry(token.text.as_str())
                .or_default()
                .push(position_offset + token.position as u32);
        }

        let terms = self.fields.entry(field.to_string()).or_default();
        let forward = self.forward.entry(doc_id).or_default();
        for (term, positions) in grouped {
            let list = terms.entry(term.to_string()).or_default();
            if list.get(doc_id).is_none() {
                forward.push((field.to_string(), term.to_string()));
            }
            list.add_posting(Posting::with_positions(doc_id, positions));
        }
    }

    /// Remove every posting of a document.
    pub fn remove_document(&mut self, doc_id: DocId) {
        let Some(entries) = self.forward.remove(&doc_id) else {
            return;
        };
        for (field, term) in entries {
            let Some(terms) = self.fields.get_mut(&field) else {
                continue;
            };
            if let Some(list) = terms.get_mut(&term) {
                list.remove(doc_id);
                if list.is_empty() {
                    terms.remove(&term);
                }
            }
            if terms.is_empty() {
                self.fields.remove(&field);
            }
        }
    }

    pub fn postings_for(&self, field: &str, term: &str) -> Option<&PostingList> {
        self.fields.get(field).and_then(|terms| terms.get(term))
    }

    /// Documents containing `term` in `field`.
    pub fn docs_with_term(&self, field: &str, term: &str) -> BTreeSet<DocId> {
        self.postings_for(field, term)
            .map(|list| list.doc_ids().collect())
            .unwrap_or_default()
    }

    pub fn term_frequency(&self, field: &str, term: &str, doc_id: DocId) -> u32 {
        self.postings_for(field, term)
            .map(|list| list.frequency(doc_id))
            .unwrap_or(0)
    }

    pub fn doc_frequency(&self, field: &str, term: &str) -> usize {
        self.postings_for(field, term)
            .map(PostingList::doc_frequency)
            .unwrap_or(0)
    }

    /// Terms of a field, unordered.
    pub fn terms(&self, field: &str) -> impl Iterator<Item = &String> {
        self.fields.get(field).into_iter().flat_map(|terms| terms.keys())
    }

    /// The `(field, term)` pairs a document contributed.
    pub fn document_terms(&self, doc_id: DocId) -> &[(String, String)] {
        self.forward.get(&doc_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct (field, term) pairs.
    pub fn term_count(&self) -> usize {
        self.fields.values().map(|terms| terms.len()).sum()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn document_count(&self) -> usize {
        self.forward.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analyzer, StandardAnalyzer};

    fn tokens(text: &str) -> Vec<Token> {
        StandardAnalyzer::new().unwrap().tokens(text).unwrap()
    }

    #[test]
    fn test_add_and_lookup() {
        let mut index = InvertedIndex::new();
        index.add_tokens(1, "title", &tokens("The Power of Positive Thinking"), 0);
        index.add_tokens(2, "title", &tokens("Think and Grow Rich, think!"), 0);

        assert_eq!(index.docs_with_term("title", "thinking"), BTreeSet::from([1]));
        assert_eq!(index.term_frequency("title", "think", 2), 2);
        assert_eq!(index.doc_frequency("title", "power"), 1);
        assert_eq!(index.doc_frequency("description", "power"), 0);
        assert_eq!(
            index.postings_for("title", "think").unwrap().get(2).unwrap().positions,
            vec![0, 4]
        );
    }

    #[test]
    fn test_array_values_shift_positions() {
        let mut index = InvertedIndex::new();
        index.add_tokens(1, "tags", &tokens("red green"), 0);
        index.add_tokens(1, "tags", &tokens("red"), 100);

        let posting = index.postings_for("tags", "red").unwrap().get(1).unwrap().clone();
        assert_eq!(posting.positions, vec![0, 100]);
        assert_eq!(posting.frequency, 2);
        assert_eq!(index.document_terms(1).len(), 2);
    }

    #[test]
    fn test_remove_document_prunes() {
        let mut index = InvertedIndex::new();
        index.add_tokens(1, "title", &tokens("magic thinking"), 0);
        index.add_tokens(2, "title", &tokens("thinking"), 0);
        assert_eq!(index.term_count(), 2);

        index.remove_document(1);
        assert!(index.postings_for("title", "magic").is_none());
        assert_eq!(index.docs_with_term("title", "thinking"), BTreeSet::from([2]));

        index.remove_document(2);
        assert_eq!(index.term_count(), 0);
        assert_eq!(index.field_count(), 0);
        assert_eq!(index.document_count(), 0);
    }
}
