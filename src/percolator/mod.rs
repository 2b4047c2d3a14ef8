//! Reverse search: stored queries matched against incoming documents.

pub mod extractor;
pub mod index;

pub use extractor::{Extraction, extract};
pub use index::PercolatorIndex;
