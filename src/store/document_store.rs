//! Versioned documents with tombstones.
//!
//! The store is the write authority: it decides versions and sequence
//! numbers and answers realtime gets. It never analyzes anything; making a
//! write searchable is the refresh pipeline's job.

use ahash::AHashMap;

use crate::document::{Source, StoredDocument, merge_source};
use crate::error::{QuarryError, Result};

/// The record a successful write produced, and whether it created the id.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub document: StoredDocument,
    pub created: bool,
}

/// Documents of one index keyed by id.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    index: String,
    docs: AHashMap<String, StoredDocument>,
    next_seq_no: u64,
    live: usize,
}

impl DocumentStore {
    pub fn new<S: Into<String>>(index: S) -> Self {
        DocumentStore {
            index: index.into(),
            docs: AHashMap::new(),
            next_seq_no: 0,
            live: 0,
        }
    }

    /// The live document with this id.
    pub fn get(&self, id: &str) -> Option<&StoredDocument> {
        self.docs.get(id).filter(|doc| doc.is_live())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Fail with a version conflict if a live document holds `id`.
    pub fn ensure_absent(&self, id: &str) -> Result<()> {
        if self.contains(id) {
            return Err(QuarryError::version_conflict(&self.index, id));
        }
        Ok(())
    }

    /// The source an update would produce: the live source with `patch` merged in.
    pub fn merged_source(&self, id: &str, patch: &Source) -> Result<Source> {
        let current = self
            .get(id)
            .ok_or_else(|| QuarryError::document_not_found(&self.index, id))?;
        let mut merged = current.source.clone();
        merge_source(&mut merged, patch);
        Ok(merged)
    }

    /// Write `source` under `id`, creating or replacing.
    ///
    /// The version continues from any previous record of the id, tombstones
    /// included, so versions strictly increase per id.
    pub fn put(&mut self, id: &str, source: Source) -> WriteOutcome {
        let seq_no = self.next_seq_no();
        match self.docs.get_mut(id) {
            Some(existing) => {
                let created = existing.deleted;
                existing.version += 1;
                existing.seq_no = seq_no;
                existing.source = source;
                existing.deleted = false;
                if created {
                    self.live += 1;
                }
                WriteOutcome {
                    document: existing.clone(),
                    created,
                }
            }
            None => {
                let document = StoredDocument::new(id, 1, seq_no, source);
                self.docs.insert(id.to_string(), document.clone());
                self.live += 1;
                WriteOutcome {
                    document,
                    created: true,
                }
            }
        }
    }

    /// Tombstone a live document.
    pub fn delete(&mut self, id: &str) -> Result<StoredDocument> {
        let seq_no = self.next_seq_no;
        let doc = self
            .docs
            .get_mut(id)
            .filter(|doc| doc.is_live())
            .ok_or_else(|| QuarryError::document_not_found(&self.index, id))?;
        doc.deleted = true;
        doc.version += 1;
        doc.seq_no = seq_no;
        doc.source = Source::new();
        let tombstone = doc.clone();
        self.next_seq_no += 1;
        self.live -= 1;
        Ok(tombstone)
    }

    /// Drop all tombstones. Returns how many were purged.
    pub fn compact(&mut self) -> usize {
        let before = self.docs.len();
        self.docs.retain(|_, doc| doc.is_live());
        before - self.docs.len()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn tombstone_count(&self) -> usize {
        self.docs.len() - self.live
    }

    /// Sequence number the next write will receive.
    pub fn max_seq_no(&self) -> Option<u64> {
        self.next_seq_no.checked_sub(1)
    }

    /// Live documents, unordered.
    pub fn iter(&self) -> impl Iterator<Item = &StoredDocument> {
        self.docs.values().filter(|doc| doc.is_live())
    }

    fn next_seq_no(&mut self) -> u64 {
        let seq_no = self.next_seq_no;
        self.next_seq_no += 1;
        seq_no
    }
}
