//! Inverted text index and columnar doc values.
//!
//! Documents are addressed by a per-index [`DocId`] assigned when a document
//! version becomes searchable. Both structures keep enough per-document
//! bookkeeping to remove a document's entries outright on overwrite or
//! delete; nothing is ever just marked stale.

pub mod doc_values;
pub mod inverted_index;
pub mod posting;

pub use doc_values::DocValues;
pub use inverted_index::InvertedIndex;
pub use posting::{Posting, PostingList};

/// Internal document number, unique within one searchable state.
pub type DocId = u64;
