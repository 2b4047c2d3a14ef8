//! Postings and posting lists.

use crate::lexical::DocId;

/// One document's occurrences of a term within a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub frequency: u32,
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(doc_id: DocId) -> Self {
        Posting {
            doc_id,
            frequency: 0,
            positions: Vec::new(),
        }
    }

    pub fn with_positions(doc_id: DocId, positions: Vec<u32>) -> Self {
        Posting {
            doc_id,
            frequency: positions.len() as u32,
            positions,
        }
    }

    pub fn add_position(&mut self, position: u32) {
        self.positions.push(position);
        self.frequency = self.positions.len() as u32;
    }
}

/// Postings of one (field, term), ordered by document id.
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    postings: Vec<Posting>,
    total_frequency: u64,
}

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a posting, merging positions if the document is already present.
    pub fn add_posting(&mut self, posting: Posting) {
        self.total_frequency += posting.frequency as u64;
        match self
            .postings
            .binary_search_by_key(&posting.doc_id, |p| p.doc_id)
        {
            Ok(pos) => {
                let existing = &mut self.postings[pos];
                existing.positions.extend(posting.positions);
                existing.positions.sort_unstable();
                existing.frequency += posting.frequency;
            }
            Err(pos) => self.postings.insert(pos, posting),
        }
    }

    /// Remove a document's posting. Returns whether it was present.
    pub fn remove(&mut self, doc_id: DocId) -> bool {
        match self.postings.binary_search_by_key(&doc_id, |p| p.doc_id) {
            Ok(pos) => {
                let removed = self.postings.remove(pos);
                self.total_frequency -= removed.frequency as u64;
                true
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, doc_id: DocId) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|pos| &self.postings[pos])
    }

    /// Term frequency in one document (0 when absent).
    pub fn frequency(&self, doc_id: DocId) -> u32 {
        self.get(doc_id).map(|p| p.frequency).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.postings.iter().map(|p| p.doc_id)
    }

    /// Number of documents containing the term.
    pub fn doc_frequency(&self) -> usize {
        self.postings.len()
    }

    pub fn total_frequency(&self) -> u64 {
        self.total_frequency
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}
